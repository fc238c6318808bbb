pub mod detection_dispatcher;
pub mod main_queue;
pub mod pipeline_logger;
