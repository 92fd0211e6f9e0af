// Unit tests for services
mod anthropic_client_test;

// Unit tests for auth and API plumbing
mod auth_test;
