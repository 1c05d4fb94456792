use crate::{CallContext, HttpConfig, HttpResponse, PreparedRequest, RemoteError, Transport};
use restbridge_schema::HttpMethod;
use std::io::Read;
use std::time::Duration;

/// Blocking transport over a shared `ureq` agent.
///
/// The agent pools idle connections up to the configured bound, applies the
/// connect/send/response timeouts, never follows redirects, and hands back
/// every status code instead of turning 4xx/5xx into errors.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_connect(Some(config.connect_timeout()))
            .timeout_send_request(Some(config.send_timeout()))
            .timeout_recv_response(Some(config.response_timeout()))
            .max_idle_connections(config.max_idle_connections)
            .max_idle_connections_per_host(config.max_idle_connections_per_host)
            .max_idle_age(config.idle_timeout())
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }

    fn prepare<B>(
        builder: ureq::RequestBuilder<B>,
        request: &PreparedRequest,
        budget: Option<Duration>,
    ) -> ureq::RequestBuilder<B> {
        let mut builder = builder;
        for (name, value) in &request.headers {
            // Derived from the body by ureq itself.
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        match budget {
            Some(left) => builder.config().timeout_global(Some(left)).build(),
            None => builder,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: &PreparedRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, RemoteError> {
        let budget = ctx.check()?;
        let url = request.url.as_str();
        let body: &[u8] = request.body.as_deref().unwrap_or_default();
        tracing::debug!("{} {url} ({} bytes)", request.method, body.len());

        let result = match request.method {
            HttpMethod::Get => Self::prepare(self.agent.get(url), request, budget).call(),
            HttpMethod::Delete => Self::prepare(self.agent.delete(url), request, budget).call(),
            HttpMethod::Post => Self::prepare(self.agent.post(url), request, budget).send(body),
            HttpMethod::Put => Self::prepare(self.agent.put(url), request, budget).send(body),
            HttpMethod::Patch => Self::prepare(self.agent.patch(url), request, budget).send(body),
        };
        let response = result.map_err(|e| match &e {
            ureq::Error::Timeout(_) => RemoteError::Timeout(e.to_string()),
            _ => RemoteError::Http(e.to_string()),
        })?;

        let status = response.status().as_u16();
        let mut body = Vec::new();
        response.into_body().into_reader().read_to_end(&mut body)?;
        tracing::debug!("{} {url} -> {status} ({} bytes)", request.method, body.len());
        Ok(HttpResponse { status, body })
    }
}
