use super::models::GatewayResponse;
use crate::MonitorError;
use encoding_rs::GBK;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The gateway expects this exact declaration in front of every request.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding = "GBK"?>"#;

/// Serialize a request document and transcode it to GBK.
pub fn encode_request<T: Serialize>(request: &T) -> Result<Vec<u8>, MonitorError> {
    let body = quick_xml::se::to_string(request).map_err(|e| MonitorError::Xml(e.to_string()))?;
    let document = format!("{XML_DECLARATION}{body}");

    let (bytes, _, had_errors) = GBK.encode(&document);
    if had_errors {
        return Err(MonitorError::Encoding(
            "request contains characters outside GBK".to_string(),
        ));
    }
    Ok(bytes.into_owned())
}

pub fn decode_gbk(raw: &[u8]) -> Result<String, MonitorError> {
    let (text, had_errors) = GBK.decode_without_bom_handling(raw);
    if had_errors {
        return Err(MonitorError::Encoding(
            "response is not valid GBK".to_string(),
        ));
    }
    Ok(text.into_owned())
}

/// Decode a GBK reply, parse it, and check its `INFO` return code.
pub fn decode_response<T>(raw: &[u8]) -> Result<T, MonitorError>
where
    T: DeserializeOwned + GatewayResponse,
{
    let text = decode_gbk(raw)?;
    // The text is UTF-8 now; the declaration has to agree.
    let text = text.replacen("GBK", "UTF-8", 1);

    let response: T = quick_xml::de::from_str(&text).map_err(|e| MonitorError::Xml(e.to_string()))?;
    response.validate()?;
    Ok(response)
}
