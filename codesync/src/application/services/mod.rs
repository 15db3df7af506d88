pub mod batch_embedder;
pub mod debouncer;
pub mod file_watcher;
pub mod health_monitor;
pub mod parallel_processor;
pub mod recovery_service;
pub mod sync_engine;
pub mod sync_queue;
pub mod worker;
