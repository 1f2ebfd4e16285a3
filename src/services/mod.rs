pub mod application_service;
pub mod conversation_flow;
pub mod duplicate_service;
pub mod email_service;
pub mod intake_service;
pub mod internship_service;
pub mod media_service;
pub mod message_service;
pub mod normalizer;
pub mod notification_service;
pub mod review_service;
pub mod sender_locks;
