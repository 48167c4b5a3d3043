/// Anything that turns one inbound wire payload into at most one outbound
/// payload. The rule engine is the production implementation; replay and
/// tests may plug in closures.
pub trait Responder {
    fn respond_raw(&self, raw: &str) -> Option<String>;
}

impl<F> Responder for F
where
    F: Fn(&str) -> Option<String>,
{
    fn respond_raw(&self, raw: &str) -> Option<String> {
        self(raw)
    }
}
