pub mod application_dto;
pub mod internship_dto;
pub mod webhook_dto;
