/// Named logging handle owned by a service.
///
/// Every component receives its own handle at construction and passes
/// [`Logger::target`] to the `log` macros, so log filtering can be done per
/// service without any process-wide registration in this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Logger {
    target: String,
}

impl Logger {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Handle for a sub-component, e.g. `didcomm/route` -> `didcomm/route/store`.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}/{}", self.target, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_targets_are_nested() {
        let log = Logger::new("didcomm/route");
        assert_eq!(log.child("service").target(), "didcomm/route/service");
    }
}
