mod counter_store;

pub use counter_store::CounterStore;
#[cfg(any(test, feature = "test-mocks"))]
pub use counter_store::MockCounterStore;
