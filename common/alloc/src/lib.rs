pub use tikv_jemallocator::Jemalloc as DefaultAllocator;

/// Installs jemalloc as the global allocator for the calling binary.
/// Long-running consumers fragment badly under the system allocator.
#[macro_export]
macro_rules! used {
    () => {
        #[global_allocator]
        static GLOBAL: $crate::DefaultAllocator = $crate::DefaultAllocator;
    };
}
