use std::time::Duration;

use crate::app::ports::HttpClientPort;
use crate::constants::REQUEST_TIMEOUT_SECS;
use crate::error::Result;

pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
}

impl ReqwestHttp {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClientPort for ReqwestHttp {
    fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send()?.error_for_status()?;
        Ok(resp.text()?)
    }
}
