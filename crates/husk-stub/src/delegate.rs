//! Forwarding component factory installed into the host construction path.

use once_cell::sync::OnceCell;

use husk_sdk::{Component, ComponentFactory};

/// Component factory the host holds from process start.
///
/// Installed before any module is known to exist. Until a payload supplies
/// a factory it is a transparent pass-through: every request resolves to
/// `None`, sending the host down its default construction path. The target
/// is set at most once, the first time a loaded module declares a factory
/// type; afterwards every call is forwarded to it verbatim.
#[derive(Default)]
pub struct DelegateComponentFactory {
    target: OnceCell<Box<dyn ComponentFactory>>,
}

impl DelegateComponentFactory {
    /// Create a delegate with no target.
    pub fn new() -> Self {
        DelegateComponentFactory {
            target: OnceCell::new(),
        }
    }

    /// Install the forwarding target.
    ///
    /// Returns `false` (and keeps the existing target) if one was already
    /// installed; the slot is fill-at-most-once.
    pub fn set_target(&self, factory: Box<dyn ComponentFactory>) -> bool {
        let installed = self.target.set(factory).is_ok();
        if !installed {
            log::warn!("component factory target already installed, ignoring replacement");
        }
        installed
    }

    /// Whether a target has been installed.
    pub fn has_target(&self) -> bool {
        self.target.get().is_some()
    }
}

impl ComponentFactory for DelegateComponentFactory {
    fn instantiate(&self, class_name: &str) -> Option<Box<dyn Component>> {
        self.target.get().and_then(|target| target.instantiate(class_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct TestComponent(String);

    impl Component for TestComponent {
        fn class_name(&self) -> &str {
            &self.0
        }
    }

    struct CountingFactory(Arc<AtomicUsize>);

    impl ComponentFactory for CountingFactory {
        fn instantiate(&self, class_name: &str) -> Option<Box<dyn Component>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(TestComponent(class_name.to_string())))
        }
    }

    #[test]
    fn test_no_op_before_target_installed() {
        let delegate = DelegateComponentFactory::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            assert!(delegate.instantiate("app::Widget").is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!delegate.has_target());

        // Once the target is installed, the same calls are forwarded.
        assert!(delegate.set_target(Box::new(CountingFactory(calls.clone()))));
        let component = delegate.instantiate("app::Widget").unwrap();
        assert_eq!(component.class_name(), "app::Widget");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_installed_at_most_once() {
        let delegate = DelegateComponentFactory::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert!(delegate.set_target(Box::new(CountingFactory(first.clone()))));
        assert!(!delegate.set_target(Box::new(CountingFactory(second.clone()))));

        delegate.instantiate("app::Widget");
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }
}
