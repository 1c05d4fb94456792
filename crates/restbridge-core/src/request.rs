use crate::catalog::Catalog;
use crate::params::{self, ParamSources, PathDefaults};
use crate::validate::validate_request;
use crate::CoreError;
use restbridge_remote::PreparedRequest;
use restbridge_schema::openapi::JSON_MEDIA_TYPE;
use restbridge_schema::{map_to_plain_json, Direction, HttpMethod, PropertyMap};
use serde_json::Value;
use tracing::debug;

/// One request to build: which route, with which body and parameter sources.
#[derive(Debug, Clone, Copy)]
pub struct RouteCall<'a> {
    pub type_token: &'a str,
    pub template: &'a str,
    pub method: HttpMethod,
    /// Engine-named body properties; ignored for GET and DELETE.
    pub body: Option<&'a PropertyMap>,
    pub sources: ParamSources<'a>,
}

/// Builds validated requests against the catalog's base URL.
pub struct RequestBuilder<'a> {
    catalog: &'a Catalog,
    base_url: &'a str,
    authorization: Option<&'a str>,
    defaults: &'a PathDefaults,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        base_url: &'a str,
        authorization: Option<&'a str>,
        defaults: &'a PathDefaults,
    ) -> Self {
        Self {
            catalog,
            base_url,
            authorization,
            defaults,
        }
    }

    fn attach_authorization(&self, request: &mut PreparedRequest) {
        let Some(value) = self.authorization.filter(|v| !v.is_empty()) else {
            return;
        };
        match self.catalog.document().auth_scheme() {
            Some(scheme) => {
                let value = match scheme.prefix {
                    Some(prefix) => format!("{prefix} {value}"),
                    None => value.to_owned(),
                };
                request.set_header(scheme.header, value);
            }
            None => request.set_header("Authorization", value),
        }
    }

    /// Resolve path parameters, translate and serialize the body, attach
    /// headers, validate, then drop path-parameter keys from the body and
    /// substitute the path.
    pub fn build(&self, call: RouteCall<'_>) -> Result<PreparedRequest, CoreError> {
        let names = self.catalog.names();
        let path_values = params::resolve(
            self.catalog,
            call.type_token,
            call.template,
            call.method,
            call.sources,
            self.defaults,
        )?;

        let mut body = call
            .body
            .filter(|_| call.method.has_body())
            .map(|b| map_to_plain_json(&names.translate_map(b, Direction::ToApi)));

        let mut request = PreparedRequest::new(call.method, String::new());
        request.set_header("Accept", JSON_MEDIA_TYPE);
        if body.is_some() {
            request.set_header("Content-Type", JSON_MEDIA_TYPE);
        }
        self.attach_authorization(&mut request);

        validate_request(
            self.catalog.document(),
            call.type_token,
            call.template,
            call.method,
            &path_values,
            body.as_mut(),
            &request,
        )?;

        if let Some(mut body) = body.take() {
            for raw in path_values.keys() {
                let property = self.catalog.param_property_name(raw);
                body.remove(raw.as_str());
                body.remove(names.to_api(property));
            }
            let bytes = serde_json::to_vec(&Value::Object(body)).map_err(|e| {
                CoreError::RequestValidation {
                    type_token: call.type_token.to_owned(),
                    path: call.template.to_owned(),
                    problems: vec![format!("body is not serializable: {e}")],
                }
            })?;
            request.set_body(bytes);
        }

        request.url = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            params::substitute(call.template, &path_values)
        );
        debug!(
            "built {} {} for {} ({} body bytes)",
            call.method,
            request.url,
            call.type_token,
            request.body_len()
        );
        Ok(request)
    }
}
