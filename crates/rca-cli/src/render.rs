//! Plain-text and JSON rendering of workflow views

use std::io::{self, Write};

use rca_core::{AuditRow, DashboardSnapshot, IncidentIntake, RcaDetail, SimilarCandidate};
use serde::Serialize;

/// Write any serializable view as pretty JSON followed by a newline
pub(crate) fn json<T: Serialize>(out: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

pub(crate) fn candidates(out: &mut dyn Write, candidates: &[SimilarCandidate]) -> io::Result<()> {
    if candidates.is_empty() {
        return writeln!(out, "No similar prior RCAs.");
    }
    for (rank, c) in candidates.iter().enumerate() {
        writeln!(
            out,
            "{:>2}. {:.3}  {}  [{}]  {}{}",
            rank + 1,
            c.score,
            c.rca_id,
            c.status,
            c.incident_title,
            if c.likely_recurrence { "  (likely recurrence)" } else { "" },
        )?;
    }
    Ok(())
}

pub(crate) fn intake(out: &mut dyn Write, intake: &IncidentIntake) -> io::Result<()> {
    writeln!(out, "Incident {} recorded: {}", intake.incident.id, intake.incident.title)?;
    writeln!(out, "RCA {} opened [{}]", intake.rca.id, intake.rca.status())?;
    writeln!(out)?;
    writeln!(out, "Similar prior RCAs:")?;
    candidates(out, &intake.candidates)
}

pub(crate) fn dashboard(out: &mut dyn Write, snapshot: &DashboardSnapshot) -> io::Result<()> {
    let counts = &snapshot.status_counts;
    writeln!(out, "RCA Dashboard ({})", snapshot.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
    writeln!(out, "=================================")?;
    writeln!(
        out,
        "RCAs: {} total, {} open, {} pending verification, {} closed",
        snapshot.total_rcas, counts.open, counts.pending_verification, counts.closed
    )?;
    writeln!(out, "Open actions:     {}", snapshot.open_actions())?;
    writeln!(out, "Missing evidence: {}", snapshot.missing_evidence())?;
    writeln!(out, "Overdue actions:  {}", snapshot.overdue_actions())?;
    writeln!(out, "Evidenced:        {:.1}%", snapshot.evidenced_pct)?;
    writeln!(out, "Verified:         {:.1}%", snapshot.verified_pct)?;
    writeln!(
        out,
        "Incidents in last {} days: {}",
        snapshot.recent_window_days, snapshot.recent_incidents
    )?;
    if snapshot.open_rcas.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Open RCAs:")?;
    for summary in &snapshot.open_rcas {
        writeln!(
            out,
            "  {}  {:<20} {:<11} missing={} overdue={}  {}",
            summary.rca_id,
            summary.status.to_string(),
            summary.environment.to_string(),
            summary.kpis.missing_evidence,
            summary.kpis.overdue_actions,
            summary.title,
        )?;
    }
    Ok(())
}

pub(crate) fn detail(out: &mut dyn Write, detail: &RcaDetail) -> io::Result<()> {
    let incident = &detail.incident;
    let rca = &detail.rca;
    writeln!(out, "{}  [{}]", rca.id, rca.status())?;
    writeln!(
        out,
        "Incident {}: {} ({}, {}, {})",
        incident.id, incident.title, incident.severity, incident.environment, incident.site
    )?;
    if let Some(component) = &incident.system_component {
        writeln!(out, "Component: {component}")?;
    }
    writeln!(out, "Occurred: {}", incident.occurred_at.to_rfc3339())?;
    if let Some(closed_at) = rca.closed_at() {
        writeln!(out, "First closed: {}", closed_at.to_rfc3339())?;
    }
    if rca.reopen_count() > 0 {
        writeln!(out, "Reopened: {} time(s)", rca.reopen_count())?;
    }
    writeln!(out)?;
    if rca.narrative.is_empty() {
        writeln!(out, "Narrative: (none yet)")?;
    } else {
        writeln!(out, "Narrative: {}", rca.narrative)?;
    }

    writeln!(out)?;
    writeln!(out, "Actions ({}):", detail.actions.len())?;
    for item in &detail.actions {
        let action = &item.action;
        writeln!(
            out,
            "  {}  [{}] {} | owner {} | due {}{}",
            action.id,
            action.status(),
            action.description,
            action.owner,
            action.due_date,
            if item.overdue { " (overdue)" } else { "" },
        )?;
        for evidence in &item.evidence {
            writeln!(
                out,
                "      evidence {} by {}: {}",
                evidence.kind, evidence.submitted_by, evidence.reference
            )?;
        }
        for verification in &item.verifications {
            writeln!(
                out,
                "      {} by {} at {}{}",
                verification.outcome,
                verification.verifier,
                verification.verified_at.format("%Y-%m-%d %H:%M"),
                verification
                    .notes
                    .as_deref()
                    .map(|notes| format!(": {notes}"))
                    .unwrap_or_default(),
            )?;
        }
    }

    if !detail.unmet.is_empty() {
        writeln!(out)?;
        writeln!(out, "Blocking closure:")?;
        for condition in &detail.unmet {
            writeln!(out, "  - {condition}")?;
        }
    }
    Ok(())
}

pub(crate) fn audit(out: &mut dyn Write, rows: &[AuditRow]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "No RCAs match.");
    }
    for row in rows {
        writeln!(
            out,
            "{}  {}  {:<11} {:<12} {:<20} {} actions ({} open, {} without evidence)  {}",
            row.created_at.format("%Y-%m-%d"),
            row.rca_id,
            row.environment.to_string(),
            row.site,
            row.status.to_string(),
            row.actions_total,
            row.actions_open,
            row.actions_missing_evidence,
            row.title,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_lists_render_a_notice() {
        assert_eq!(render(|out| candidates(out, &[])), "No similar prior RCAs.\n");
        assert_eq!(render(|out| audit(out, &[])), "No RCAs match.\n");
    }

    #[test]
    fn json_ends_with_newline() {
        let text = render(|out| json(out, &serde_json::json!({ "ok": true })));
        assert!(text.ends_with("}\n"));
    }
}
