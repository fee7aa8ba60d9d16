use serde_json::{json, Value};
use viewstamped_rs::view::View;

/// Describe a view in list form.
pub(crate) fn view_json(viewno: u64, primary: usize, uids: &[&str]) -> Value {
    json!({
        "viewno": viewno,
        "primary": primary,
        "members": uids,
    })
}

/// Parse a view in list form, as seen by the replica `my_uid`.
pub(crate) fn view(viewno: u64, primary: usize, uids: &[&str], my_uid: &str) -> View {
    View::parse(&view_json(viewno, primary, uids), true, my_uid).unwrap()
}

pub(crate) fn uids(view: &View) -> Vec<&str> {
    view.members().iter().map(|member| member.uid()).collect()
}
