pub mod ask;
pub mod doctor;
pub mod init;
pub mod knowledge;
pub mod serve;
