use std::io::{self, Write};
use whypending_core::Detail;
use whypending_engine::Term;

/// How diagnoses are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One summary line per node
    Summary,
    /// Summary followed by one section per mismatch category
    Full,
    /// One JSON record per node
    Json,
}

/// Render details in the chosen format
pub fn render<W: Write>(out: &mut W, details: &[Detail], format: Format) -> io::Result<()> {
    match format {
        Format::Summary => write_summary(out, details),
        Format::Full => write_full(out, details),
        Format::Json => write_json(out, details),
    }
}

/// One `Detail` per line
pub fn write_json<W: Write>(out: &mut W, details: &[Detail]) -> io::Result<()> {
    for detail in details {
        serde_json::to_writer(&mut *out, detail)?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_summary<W: Write>(out: &mut W, details: &[Detail]) -> io::Result<()> {
    for detail in details {
        writeln!(out, "{}", detail.summary())?;
    }
    Ok(())
}

type Section = (&'static str, fn(&Detail) -> Vec<String>);

const SECTIONS: [Section; 7] = [
    ("Resource:", resource_fields),
    ("Node Affinity:", node_affinity_fields),
    ("Taint:", taint_fields),
    ("Pod Anti-Affinity:", pod_anti_affinity_fields),
    ("Pod Affinity:", pod_affinity_fields),
    ("PV Affinity:", pv_affinity_fields),
    ("Notes:", note_fields),
];

/// Summary and every category section; each section lists only nodes with
/// at least one entry
pub fn write_full<W: Write>(out: &mut W, details: &[Detail]) -> io::Result<()> {
    writeln!(out, "Summary:")?;
    write_summary(out, details)?;
    writeln!(out)?;

    for (title, section_fields) in SECTIONS {
        writeln!(out, "{}", title)?;
        for detail in details {
            let fields = section_fields(detail);
            if !fields.is_empty() {
                writeln!(out, "{} {}", detail.node_name, fields.join(" "))?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn resource_fields(detail: &Detail) -> Vec<String> {
    detail
        .resource_not_enough
        .iter()
        .map(|r| format!("{}({}<{})", r.resource_name, r.left, r.required))
        .collect()
}

fn node_affinity_fields(detail: &Detail) -> Vec<String> {
    detail
        .node_affinity_mismatch
        .iter()
        .flat_map(|m| m.term.match_expressions.iter().flatten())
        .map(|req| {
            format!(
                "{}:{}:{}",
                req.key,
                req.operator,
                req.values.as_deref().unwrap_or_default().join(",")
            )
        })
        .collect()
}

fn taint_fields(detail: &Detail) -> Vec<String> {
    detail
        .node_taint_not_tolerated
        .iter()
        .map(|t| {
            format!(
                "{}={}",
                t.taint.key,
                t.taint.value.as_deref().unwrap_or_default()
            )
        })
        .collect()
}

fn pod_affinity_fields(detail: &Detail) -> Vec<String> {
    detail
        .pod_affinity_mismatch
        .iter()
        .map(|m| match &m.term.label_selector {
            Some(selector) => {
                let rendered = Term::from_label_selector(selector).to_string();
                if rendered.is_empty() {
                    "<all>".to_string()
                } else {
                    rendered
                }
            }
            None => "<none>".to_string(),
        })
        .collect()
}

fn pod_anti_affinity_fields(detail: &Detail) -> Vec<String> {
    detail
        .pod_anti_affinity_mismatch
        .iter()
        .map(|m| format!("{}/{}", m.namespace, m.pod_name))
        .collect()
}

fn pv_affinity_fields(detail: &Detail) -> Vec<String> {
    detail
        .pv_affinity_mismatch
        .iter()
        .map(|m| format!("{}({})", m.volume_name, m.claim_name))
        .collect()
}

fn note_fields(detail: &Detail) -> Vec<String> {
    if detail.notes.is_empty() {
        return Vec::new();
    }
    let notes: Vec<String> = detail.notes.iter().map(|n| n.to_string()).collect();
    vec![notes.join("; ")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use whypending_core::k8s_openapi::api::core::v1::{
        NodeSelectorRequirement, NodeSelectorTerm, PodAffinityTerm, Taint,
    };
    use whypending_core::k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        LabelSelector, LabelSelectorRequirement,
    };
    use whypending_core::{
        Findings, NodeAffinityMismatch, Note, PodAffinityMismatch, PodAntiAffinityMismatch,
        PvAffinityMismatch, Quantity, ResourceShortfall, TaintNotTolerated,
    };

    fn render_to_string(details: &[Detail], format: Format) -> String {
        let mut out = Vec::new();
        render(&mut out, details, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn blocked_node() -> Detail {
        let findings = Findings {
            resource_not_enough: vec![ResourceShortfall {
                resource_name: "cpu".to_string(),
                required: Quantity::parse("2").unwrap(),
                left: Quantity::parse("500m").unwrap(),
            }],
            node_taint_not_tolerated: vec![TaintNotTolerated {
                taint: Taint {
                    key: "dedicated".to_string(),
                    value: Some("gpu".to_string()),
                    effect: "NoSchedule".to_string(),
                    time_added: None,
                },
            }],
            node_affinity_mismatch: vec![NodeAffinityMismatch {
                term: NodeSelectorTerm {
                    match_expressions: Some(vec![NodeSelectorRequirement {
                        key: "zone".to_string(),
                        operator: "In".to_string(),
                        values: Some(vec!["a".to_string(), "b".to_string()]),
                    }]),
                    match_fields: None,
                },
            }],
            pod_affinity_mismatch: vec![PodAffinityMismatch {
                term: PodAffinityTerm {
                    topology_key: "zone".to_string(),
                    label_selector: Some(LabelSelector {
                        match_labels: Some(BTreeMap::from([(
                            "app".to_string(),
                            "cache".to_string(),
                        )])),
                        match_expressions: Some(vec![LabelSelectorRequirement {
                            key: "tier".to_string(),
                            operator: "In".to_string(),
                            values: Some(vec!["a".to_string(), "b".to_string()]),
                        }]),
                    }),
                    ..Default::default()
                },
            }],
            pod_anti_affinity_mismatch: vec![PodAntiAffinityMismatch {
                term: PodAffinityTerm::default(),
                namespace: "prod".to_string(),
                pod_name: "web-1".to_string(),
            }],
            pv_affinity_mismatch: vec![PvAffinityMismatch {
                volume_name: "pv-1".to_string(),
                claim_name: "data".to_string(),
                terms: Vec::new(),
            }],
            notes: vec![Note::UnsupportedMatchFields {
                keys: vec!["metadata.name".to_string()],
            }],
        };
        Detail::from_findings("node-1", findings)
    }

    fn free_node() -> Detail {
        Detail::from_findings("node-2", Findings::default())
    }

    #[test]
    fn test_summary_only_by_default() {
        let text = render_to_string(&[blocked_node(), free_node()], Format::Summary);
        assert_eq!(
            text,
            "node-1 ResourceNotEnough NodeTaintNotTolerated NodeAffinityMismatch \
             PodAffinityMismatch PodAntiAffinityMismatch PvAffinityMismatch\n\
             node-2 Schedulable\n"
        );
    }

    #[test]
    fn test_full_report_sections() {
        let text = render_to_string(&[blocked_node(), free_node()], Format::Full);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Summary:");
        assert!(lines.contains(&"node-1 cpu(500m<2)"));
        assert!(lines.contains(&"node-1 zone:In:a,b"));
        assert!(lines.contains(&"node-1 dedicated=gpu"));
        assert!(lines.contains(&"node-1 prod/web-1"));
        assert!(lines.contains(&"node-1 app=cache,tier in (a,b)"));
        assert!(lines.contains(&"node-1 pv-1(data)"));
        assert!(lines.contains(&"node-1 matchFields metadata.name not evaluated"));

        // The schedulable node only appears in the summary
        assert_eq!(lines.iter().filter(|l| l.starts_with("node-2")).count(), 1);

        let titles: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| l.ends_with(':'))
            .collect();
        assert_eq!(
            titles,
            vec![
                "Summary:",
                "Resource:",
                "Node Affinity:",
                "Taint:",
                "Pod Anti-Affinity:",
                "Pod Affinity:",
                "PV Affinity:",
                "Notes:",
            ]
        );
    }

    #[test]
    fn test_json_lines() {
        let text = render_to_string(&[blocked_node(), free_node()], Format::Json);
        let records: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["nodeName"], "node-1");
        assert_eq!(records[0]["schedulable"], false);
        assert_eq!(records[0]["resourceNotEnough"][0]["left"], "500m");
        assert_eq!(records[1]["nodeName"], "node-2");
        assert_eq!(records[1]["schedulable"], true);
        assert!(records[1].get("resourceNotEnough").is_none());
    }

    #[test]
    fn test_empty_details_render_nothing() {
        assert_eq!(render_to_string(&[], Format::Summary), "");
        assert_eq!(render_to_string(&[], Format::Json), "");
    }

    #[test]
    fn test_nil_selector_is_rendered() {
        let detail = Detail::from_findings(
            "node-3",
            Findings {
                pod_affinity_mismatch: vec![PodAffinityMismatch {
                    term: PodAffinityTerm::default(),
                }],
                ..Default::default()
            },
        );
        assert_eq!(pod_affinity_fields(&detail), vec!["<none>".to_string()]);
    }
}
