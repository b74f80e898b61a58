//! Unit test harness

mod unit {
    mod test_orchestrator;
}
