//! Health checks against the client's gateway.
//!
//! The connectivity probe reads back a known transaction and compares it to
//! what the operator configured; the business probe occasionally submits a
//! zero-amount payment to exercise the signing path.

pub mod codec;
pub mod models;

use crate::config::RobotSettings;
use crate::MonitorError;
use models::{
    DirectPaymentRequest, DirectPaymentResponse, GatewayResponse, GetPaymentInfoRequest,
    GetPaymentInfoResponse,
};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(29);

/// What the gateway has always been sent, despite the XML body.
pub const GATEWAY_CONTENT_TYPE: &str = "application/json";

/// The business probe runs once every this many connectivity checks.
pub const BUSINESS_PROBE_EVERY: u32 = 5;

/// Reply to the business probe when no certificate card is inserted. The
/// write path was reached, so this counts as healthy.
pub const CERTIFICATE_NOT_INSERTED: &str = "签名错误，请检查证书卡是否正确插入";

/// The transaction the connectivity probe expects to read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorExpectation {
    pub url: String,
    pub username: String,
    pub system_sn: String,
    pub channel_sn: String,
    /// Minor units.
    pub amount: i64,
    pub status: String,
    pub date: String,
}

impl MonitorExpectation {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        system_sn: impl Into<String>,
        channel_sn: impl Into<String>,
        amount: i64,
        status: impl Into<String>,
        date: impl Into<String>,
    ) -> Result<Self, MonitorError> {
        let expectation = Self {
            url: url.into(),
            username: username.into(),
            system_sn: system_sn.into(),
            channel_sn: channel_sn.into(),
            amount,
            status: status.into(),
            date: date.into(),
        };

        let required = [
            ("url", &expectation.url),
            ("username", &expectation.username),
            ("system sn", &expectation.system_sn),
            ("channel sn", &expectation.channel_sn),
            ("status", &expectation.status),
            ("date", &expectation.date),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(MonitorError::MissingField(*name));
        }
        if expectation.amount == 0 {
            return Err(MonitorError::AmountIsZero);
        }

        Ok(expectation)
    }

    pub fn from_settings(settings: &RobotSettings) -> Result<Self, MonitorError> {
        Self::new(
            &settings.url,
            &settings.username,
            &settings.system_sn,
            &settings.channel_sn,
            settings.amount,
            &settings.status,
            &settings.date,
        )
    }
}

/// How the occasional business probe went. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessProbe {
    Accepted,
    CertificateNotInserted,
    Failed(String),
}

/// Result of one `probe` cycle.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// The only part the supervisor acts on.
    pub connectivity: Result<(), MonitorError>,
    /// Set when this cycle also ran the business probe.
    pub business: Option<BusinessProbe>,
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        self.connectivity.is_ok()
    }
}

pub struct HealthMonitor {
    http: reqwest::Client,
    expectation: MonitorExpectation,
    checks: u32,
}

impl HealthMonitor {
    pub fn new(expectation: MonitorExpectation) -> Result<Self, MonitorError> {
        let http = reqwest::Client::builder().timeout(GATEWAY_TIMEOUT).build()?;
        Ok(Self {
            http,
            expectation,
            checks: 0,
        })
    }

    pub fn from_settings(settings: &RobotSettings) -> Result<Self, MonitorError> {
        Self::new(MonitorExpectation::from_settings(settings)?)
    }

    pub fn expectation(&self) -> &MonitorExpectation {
        &self.expectation
    }

    /// Connectivity checks since the last business probe.
    pub fn checks(&self) -> u32 {
        self.checks
    }

    /// Read back the configured transaction and compare it field by field.
    pub async fn probe_connectivity(&mut self) -> Result<(), MonitorError> {
        self.checks += 1;

        let exp = &self.expectation;
        let request =
            GetPaymentInfoRequest::for_reference(&exp.username, &exp.date, &exp.system_sn);
        let response: GetPaymentInfoResponse = self.request(&request).await?;
        check_payment(&response, &self.expectation)
    }

    /// One health cycle. Never fails as a whole: the connectivity result is
    /// carried in the outcome and the business probe is diagnostic only.
    pub async fn probe(&mut self) -> ProbeOutcome {
        let connectivity = self.probe_connectivity().await;
        if let Err(e) = &connectivity {
            debug!(username = %self.expectation.username, "connectivity probe failed: {e}");
        }

        let mut business = None;
        if connectivity.is_ok() && self.checks >= BUSINESS_PROBE_EVERY {
            self.checks = 0;
            business = Some(self.probe_business().await);
        }

        ProbeOutcome {
            connectivity,
            business,
        }
    }

    async fn probe_business(&self) -> BusinessProbe {
        let request = DirectPaymentRequest::probe(&self.expectation.username);
        match self.request::<_, DirectPaymentResponse>(&request).await {
            Ok(_) => {
                debug!(username = %self.expectation.username, "business probe accepted");
                BusinessProbe::Accepted
            }
            Err(e) if e.to_string().contains(CERTIFICATE_NOT_INSERTED) => {
                debug!(username = %self.expectation.username, "business probe reached signing");
                BusinessProbe::CertificateNotInserted
            }
            Err(e) => {
                warn!(username = %self.expectation.username, "business probe failed: {e}");
                BusinessProbe::Failed(e.to_string())
            }
        }
    }

    async fn request<Req, Resp>(&self, request: &Req) -> Result<Resp, MonitorError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + GatewayResponse,
    {
        let body = codec::encode_request(request)?;
        let raw = self
            .http
            .post(&self.expectation.url)
            .header(CONTENT_TYPE, GATEWAY_CONTENT_TYPE)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        codec::decode_response(&raw)
    }
}

/// Exactly one record, matching amount, channel serial and status.
pub fn check_payment(
    response: &GetPaymentInfoResponse,
    expect: &MonitorExpectation,
) -> Result<(), MonitorError> {
    let [record] = response.payments.as_slice() else {
        error!(
            username = %expect.username,
            count = response.payments.len(),
            "unexpected number of transactions"
        );
        return Err(MonitorError::BadTxCount {
            count: response.payments.len(),
        });
    };

    let amount = record.amount.to_minor_units();
    if amount != expect.amount {
        error!(
            username = %expect.username,
            response_amount = amount,
            expect = expect.amount,
            "transaction amount does not match"
        );
        return Err(MonitorError::BadRespTxAmount {
            actual: amount,
            expected: expect.amount,
        });
    }

    if record.request_number != expect.channel_sn {
        error!(
            username = %expect.username,
            response_sn = %record.request_number,
            expect = %expect.channel_sn,
            "channel serial number does not match"
        );
        return Err(MonitorError::BadRespChannelSn {
            actual: record.request_number.clone(),
            expected: expect.channel_sn.clone(),
        });
    }

    if record.return_flag != expect.status {
        error!(
            username = %expect.username,
            response_status = %record.return_flag,
            expect = %expect.status,
            "transaction status does not match"
        );
        return Err(MonitorError::BadRespTxStatus {
            actual: record.return_flag.clone(),
            expected: expect.status.clone(),
        });
    }

    Ok(())
}
