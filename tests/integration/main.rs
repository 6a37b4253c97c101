mod device_session_test;
mod escalation_test;
mod support;
