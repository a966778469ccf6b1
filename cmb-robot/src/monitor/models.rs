//! Gateway documents. Every document is rooted at `CMBSDKPGK` and carries an
//! `INFO` header; the business payload sits in named sibling blocks.

use crate::MonitorError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DATA_TYPE_XML: u8 = 2;
pub const BUSINESS_CODE_PAYMENT: &str = "N02031";

pub const FN_GET_PAYMENT_INFO: &str = "GetPaymentInfo";
pub const FN_DIRECT_PAYMENT: &str = "DCPAYMNT";

/// Money as the gateway writes it: decimal text in major units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Amount(pub f64);

impl Amount {
    /// Integer minor units, rounded to the nearest cent.
    pub fn to_minor_units(self) -> i64 {
        (self.0 * 100.0).round() as i64
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:.2}", self.0))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Amount(0.0));
        }
        text.parse::<f64>()
            .map(Amount)
            .map_err(|e| serde::de::Error::custom(format!("bad amount {text:?}: {e}")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    #[serde(rename = "FUNNAM")]
    pub function: String,
    #[serde(rename = "DATTYP")]
    pub data_type: u8,
    #[serde(rename = "LGNNAM")]
    pub login_name: String,
}

impl RequestInfo {
    pub fn new(function: &str, login_name: &str) -> Self {
        Self {
            function: function.to_string(),
            data_type: DATA_TYPE_XML,
            login_name: login_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseInfo {
    #[serde(rename = "FUNNAM", default)]
    pub function: String,
    #[serde(rename = "DATTYP", default)]
    pub data_type: i32,
    /// Non-zero means the gateway rejected the request without running it.
    #[serde(rename = "RETCOD", default)]
    pub return_code: i64,
    #[serde(rename = "ERRMSG", default)]
    pub error_message: String,
}

impl ResponseInfo {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.return_code != 0 {
            return Err(MonitorError::ActionFailed {
                function: self.function.clone(),
                code: self.return_code,
                message: self.error_message.clone(),
            });
        }
        Ok(())
    }
}

/// Decoded gateway reply.
pub trait GatewayResponse {
    fn info(&self) -> &ResponseInfo;

    fn validate(&self) -> Result<(), MonitorError> {
        self.info().validate()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename = "CMBSDKPGK")]
pub struct GetPaymentInfoRequest {
    #[serde(rename = "INFO")]
    pub info: RequestInfo,
    #[serde(rename = "SDKPAYQYX")]
    pub query: PaymentQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentQuery {
    #[serde(rename = "BUSCOD")]
    pub business_code: String,
    #[serde(rename = "BGNDAT")]
    pub begin_date: String,
    #[serde(rename = "ENDDAT")]
    pub end_date: String,
    #[serde(rename = "YURREF", skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

impl GetPaymentInfoRequest {
    /// Query one day's payments for a single system serial number.
    pub fn for_reference(login_name: &str, date: &str, reference: &str) -> Self {
        Self {
            info: RequestInfo::new(FN_GET_PAYMENT_INFO, login_name),
            query: PaymentQuery {
                business_code: BUSINESS_CODE_PAYMENT.to_string(),
                begin_date: date.to_string(),
                end_date: date.to_string(),
                reference: reference.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPaymentInfoResponse {
    #[serde(rename = "INFO", default)]
    pub info: ResponseInfo,
    #[serde(rename = "NTQPAYQYZ", default)]
    pub payments: Vec<PaymentRecord>,
}

impl GatewayResponse for GetPaymentInfoResponse {
    fn info(&self) -> &ResponseInfo {
        &self.info
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentRecord {
    #[serde(rename = "BUSMOD")]
    pub business_mode: String,
    #[serde(rename = "CRTACC")]
    pub credit_account: String,
    #[serde(rename = "CRTNAM")]
    pub credit_name: String,
    #[serde(rename = "CRTBNK")]
    pub credit_bank: String,
    #[serde(rename = "TRSAMT")]
    pub amount: Amount,
    #[serde(rename = "NUSAGE")]
    pub usage: String,
    #[serde(rename = "OPRDAT")]
    pub operation_date: String,
    /// System serial number.
    #[serde(rename = "YURREF")]
    pub reference: String,
    /// Channel serial number.
    #[serde(rename = "REQNBR")]
    pub request_number: String,
    #[serde(rename = "REQSTS")]
    pub request_status: String,
    #[serde(rename = "RTNFLG")]
    pub return_flag: String,
    /// Failure or refund reason.
    #[serde(rename = "RTNNAR")]
    pub return_narrative: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename = "CMBSDKPGK")]
pub struct DirectPaymentRequest {
    #[serde(rename = "INFO")]
    pub info: RequestInfo,
    #[serde(rename = "SDKPAYRQX")]
    pub business: BusinessCode,
    #[serde(rename = "DCOPDPAYX")]
    pub payment: PaymentOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessCode {
    #[serde(rename = "BUSCOD")]
    pub business_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    #[serde(rename = "YURREF")]
    pub reference: String,
    #[serde(rename = "DBTACC")]
    pub debit_account: String,
    #[serde(rename = "DBTBBK")]
    pub debit_region: String,
    #[serde(rename = "TRSAMT")]
    pub amount: Amount,
    #[serde(rename = "CCYNBR")]
    pub currency: String,
    /// `N` normal, `F` fast.
    #[serde(rename = "STLCHN")]
    pub settlement_channel: String,
    #[serde(rename = "NUSAGE")]
    pub usage: String,
    #[serde(rename = "BNKFLG")]
    pub same_bank: String,
    #[serde(rename = "CRTACC")]
    pub credit_account: String,
    #[serde(rename = "CRTNAM")]
    pub credit_name: String,
    #[serde(rename = "CRTBNK", skip_serializing_if = "String::is_empty")]
    pub credit_bank: String,
    #[serde(rename = "CRTADR", skip_serializing_if = "String::is_empty")]
    pub credit_address: String,
}

/// Reference no real payment will ever use.
pub const PROBE_REFERENCE: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFF";
const PLACEHOLDER_ACCOUNT: &str = "0000000000000000";

impl DirectPaymentRequest {
    /// Zero-amount payment between placeholder accounts. The gateway has to
    /// sign it before refusing it, which exercises the write path.
    pub fn probe(login_name: &str) -> Self {
        Self {
            info: RequestInfo::new(FN_DIRECT_PAYMENT, login_name),
            business: BusinessCode {
                business_code: BUSINESS_CODE_PAYMENT.to_string(),
            },
            payment: PaymentOrder {
                reference: PROBE_REFERENCE.to_string(),
                debit_account: PLACEHOLDER_ACCOUNT.to_string(),
                debit_region: "92".to_string(),
                amount: Amount(0.0),
                currency: "10".to_string(),
                settlement_channel: "N".to_string(),
                usage: "机器人出金测试".to_string(),
                same_bank: "Y".to_string(),
                credit_account: PLACEHOLDER_ACCOUNT.to_string(),
                credit_name: String::new(),
                credit_bank: "招商银行".to_string(),
                credit_address: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectPaymentResponse {
    #[serde(rename = "INFO", default)]
    pub info: ResponseInfo,
    #[serde(rename = "NTQPAYRQZ", default)]
    pub result: Option<PaymentResult>,
}

impl GatewayResponse for DirectPaymentResponse {
    fn info(&self) -> &ResponseInfo {
        &self.info
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentResult {
    #[serde(rename = "ERRCOD")]
    pub error_code: String,
    #[serde(rename = "ERRTXT")]
    pub error_text: String,
    #[serde(rename = "REQNBR")]
    pub request_number: String,
    #[serde(rename = "REQSTS")]
    pub request_status: String,
    #[serde(rename = "RTNFLG")]
    pub return_flag: String,
    #[serde(rename = "YURREF")]
    pub reference: String,
}
