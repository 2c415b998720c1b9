//! Content negotiation over the `Accept` header.

use http::StatusCode;
use serde_json::Value;

use super::errors::ErrorKind;
use super::{Context, Error, Result};
use crate::render::{MIME_HTML, MIME_JSON, MIME_XML, MIME_XML2};

/// Payloads for [`Context::negotiate`].
///
/// A format-specific payload wins over `data`, which serves as the fallback
/// for every format.
#[derive(Clone, Debug, Default)]
pub struct Negotiate {
    pub offered: Vec<&'static str>,
    pub html_name: String,
    pub html_data: Option<Value>,
    pub json_data: Option<Value>,
    pub xml_data: Option<Value>,
    pub data: Option<Value>,
}

/// Split an `Accept` header into media types, in header order.
///
/// Parameters after `;` are dropped, as are empty entries.
pub fn parse_accept(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn choose_data<'a>(
    specific: Option<&'a Value>,
    fallback: Option<&'a Value>,
    format: &str,
) -> Result<&'a Value> {
    specific
        .or(fallback)
        .ok_or_else(|| Error::MissingNegotiationData {
            format: format.to_string(),
        })
}

impl Context {
    /// Pick the response format from `offered`.
    ///
    /// Accepted types are tried in header order, offers in caller order; the
    /// first equal pair wins. Without any parseable `Accept` entry the first
    /// offer wins. `Ok(None)` means nothing offered is acceptable.
    pub fn negotiate_format<'a>(&mut self, offered: &[&'a str]) -> Result<Option<&'a str>> {
        let Some(&first) = offered.first() else {
            return Err(Error::NoOffers);
        };

        if self.accepted.is_none() {
            let accepted = parse_accept(self.request().accept().unwrap_or(""));
            self.accepted = Some(accepted);
        }
        let accepted = self.accepted.as_deref().unwrap_or(&[]);
        if accepted.is_empty() {
            return Ok(Some(first));
        }

        for accept in accepted {
            if let Some(&offer) = offered.iter().find(|&&offer| offer == accept.as_str()) {
                return Ok(Some(offer));
            }
        }
        Ok(None)
    }

    /// Override the accepted formats for this request.
    pub fn set_accepted(&mut self, formats: Vec<String>) {
        self.accepted = Some(formats);
    }

    /// Accepted formats, once parsed or set.
    pub fn accepted(&self) -> Option<&[String]> {
        self.accepted.as_deref()
    }

    /// Render the negotiated representation with `code`.
    ///
    /// When nothing offered is acceptable the chain is aborted with 406 and a
    /// public error is recorded.
    pub fn negotiate(&mut self, code: StatusCode, config: &Negotiate) -> Result<()> {
        match self.negotiate_format(&config.offered)? {
            Some(MIME_JSON) => {
                let data = choose_data(config.json_data.as_ref(), config.data.as_ref(), MIME_JSON)?;
                self.json(code, data)
            }
            Some(MIME_HTML) => {
                let data = choose_data(config.html_data.as_ref(), config.data.as_ref(), MIME_HTML)?;
                self.html(code, &config.html_name, data)
            }
            Some(format @ (MIME_XML | MIME_XML2)) => {
                let data = choose_data(config.xml_data.as_ref(), config.data.as_ref(), format)?;
                self.xml(code, data)
            }
            _ => {
                self.abort_with_error(
                    StatusCode::NOT_ACCEPTABLE,
                    "the accepted formats are not offered by the server",
                )
                .set_kind(ErrorKind::PUBLIC);
                Ok(())
            }
        }
    }
}
