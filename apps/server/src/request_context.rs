/// Per-request context propagated through request extensions.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
}
