pub mod chat;
pub mod config;
pub mod parse;
pub mod run;
