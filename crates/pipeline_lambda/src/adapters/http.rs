/// Source of raw datasets published over HTTP.
pub trait HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpSource {
    client: reqwest::Client,
}

impl ReqwestHttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpSource for ReqwestHttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let url = url.to_string();
        let client = self.client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|error| format!("Failed to fetch URL: {url}: {error}"))?;
                ensure_ok(&url, response.status().as_u16())?;
                let body = response
                    .bytes()
                    .await
                    .map_err(|error| format!("Failed to read body of {url}: {error}"))?;
                Ok::<_, String>(body.to_vec())
            })
        })
    }
}

/// Only `200 OK` counts as a successful fetch.
pub fn ensure_ok(url: &str, status: u16) -> Result<(), String> {
    if status == 200 {
        Ok(())
    } else {
        Err(format!("Failed to fetch URL: {url} (status {status})"))
    }
}
