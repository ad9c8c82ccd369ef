mod helpers;
mod rollback_tests;
mod write_tests;
