//! Wire event types emitted toward the browser.

pub mod app;

pub use app::AppEvent;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallId;

    #[test]
    fn hello_event_has_expected_name_and_shape() {
        let event = AppEvent::Hello {
            call_id: CallId::new("c1"),
        };
        assert_eq!(event.name(), "hello");
        assert_eq!(event.data_json()["call_id"], "c1");
    }

    #[test]
    fn ping_event_serializes_with_null_data() {
        let event = AppEvent::Ping;
        assert_eq!(event.name(), "ping");
    }
}
