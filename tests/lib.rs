mod common;
mod integration;
mod unit;
