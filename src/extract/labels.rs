/// Icon identifier → human field label.
pub type LabelMap = &'static [(&'static str, &'static str)];

/// Unknown icons keep their raw identifier so no row is ever dropped.
pub fn label_for(labels: LabelMap, icon: &str) -> String {
    labels
        .iter()
        .find(|(id, _)| *id == icon)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| icon.to_string())
}
