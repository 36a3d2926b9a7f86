use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

static TMP_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn next_tmp_suffix() -> u64 {
    let mut hasher = DefaultHasher::new();
    let counter = TMP_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    counter.hash(&mut hasher);
    hasher.finish()
}

/// Build a temporary local id for an optimistically created entity.
///
/// tmp-* ids are placeholders until the create round trip returns the
/// canonical server id, which is then swapped in everywhere.
pub(crate) fn make_tmp_id(now_ms: i64) -> String {
    format!("tmp-{now_ms}-{}", next_tmp_suffix())
}

pub(crate) fn is_tmp_id(id: &str) -> bool {
    id.starts_with("tmp-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_ids_are_recognizable_and_unique() {
        let a = make_tmp_id(1000);
        let b = make_tmp_id(1000);
        assert!(is_tmp_id(&a));
        assert!(is_tmp_id(&b));
        assert_ne!(a, b);
        assert!(!is_tmp_id("9f2c1c2e-aaaa-bbbb-cccc-000000000000"));
    }
}
