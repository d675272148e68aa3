use super::*;
use crate::gpu::Service;
use crate::log::{LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};

struct WarnCounter(Arc<Mutex<Vec<String>>>);

impl Logger for WarnCounter {
    fn log(&self, entry: &LogEntry) {
        if entry.severity == LogSeverity::Warn {
            self.0.lock().unwrap().push(entry.message.clone());
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

#[test]
fn test_parse_mixed_delimiters() {
    let flags = Workarounds::parse("4, 8 13");
    assert_eq!(
        flags,
        Workarounds::DISABLE_DEPTH_TEXTURE
            | Workarounds::MAX_TEXTURE_SIZE_LIMIT_4096
            | Workarounds::USE_CURRENT_PROGRAM_AFTER_SUCCESSFUL_LINK
    );
}

#[test]
fn test_parse_empty_is_empty() {
    assert!(Workarounds::parse("").is_empty());
    assert!(Workarounds::parse(" , ,").is_empty());
}

#[test]
#[serial]
fn test_unknown_ids_are_logged_not_fatal() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    Service::set_logger(WarnCounter(warnings.clone()));

    let flags = Workarounds::parse("1,999,abc,2");
    assert_eq!(
        flags,
        Workarounds::CLEAR_ALPHA_IN_READPIXELS | Workarounds::CLEAR_UNIFORMS_BEFORE_PROGRAM_USE
    );
    let warnings = warnings.lock().unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("999"));
    assert!(warnings[1].contains("abc"));
    drop(warnings);
    Service::reset_logger();
}

#[test]
fn test_table_ids_are_unique_and_names_follow_flags() {
    for (i, (id, _, _)) in WORKAROUND_TABLE.iter().enumerate() {
        assert!(WORKAROUND_TABLE[i + 1..].iter().all(|(other, _, _)| other != id));
    }
    let names = Workarounds::parse("16,1").names();
    assert_eq!(names, vec!["clear_alpha_in_readpixels", "disable_multisampling"]);
}
