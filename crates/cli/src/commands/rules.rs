use storefront_core::rfm::{SegmentLabel, SEGMENT_RULES};

pub fn run() -> String {
    let mut lines = vec!["segment rules (evaluated in order, first match wins):".to_string()];

    for (position, rule) in SEGMENT_RULES.iter().enumerate() {
        lines.push(format!(
            "{:>2}. {} [R{} F{} M{}]",
            position + 1,
            rule.label,
            rule.recency,
            rule.frequency,
            rule.monetary
        ));
        lines.push(render_guidance(rule.label));
    }

    lines.push(format!("fallback: {}", SegmentLabel::Other));
    lines.push(render_guidance(SegmentLabel::Other));

    lines.join("\n")
}

fn render_guidance(label: SegmentLabel) -> String {
    format!("    {} -> {}", label.description(), label.recommended_action())
}
