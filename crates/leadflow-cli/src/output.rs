use leadflow_core::portal::{ChatReply, Invoice, Project, TimelineEvent, UserProfile};
use leadflow_core::{format_brl, Lead, LeadStatus, PipelineStats};
use leadflow_store::LeadSnapshot;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn money(value: f64) -> String {
    format_brl(value)
}

pub fn lead_line(lead: &Lead) -> String {
    let company = lead
        .company
        .as_deref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default();
    format!(
        "#{:<5} {:<16} {:<7} {:>14}  {}{}",
        lead.id,
        lead.status.label(),
        lead.temperature.as_str(),
        money(lead.estimated_value),
        lead.name,
        company
    )
}

pub fn lead_detail(lead: &Lead) -> String {
    let mut lines = vec![
        format!("#{} {}", lead.id, lead.name),
        format!("  status:      {}", lead.status.label()),
        format!("  temperature: {}", lead.temperature),
        format!("  value:       {}", money(lead.estimated_value)),
    ];
    let contact = [
        ("email", &lead.email),
        ("phone", &lead.phone),
        ("company", &lead.company),
        ("role", &lead.role),
        ("source", &lead.source),
    ];
    for (label, value) in contact {
        if let Some(value) = value {
            lines.push(format!("  {label:<12} {value}"));
        }
    }
    if let Some(q) = &lead.qualification {
        if let Some(score) = q.score {
            lines.push(format!("  score:       {score:.0}"));
        }
        if let Some(notes) = &q.notes {
            lines.push(format!("  notes:       {notes}"));
        }
    }
    if let Some(roi) = &lead.roi {
        if let Some(months) = roi.payback_months {
            lines.push(format!("  payback:     {months:.1} months"));
        }
    }
    if !lead.conversation.is_empty() {
        lines.push(format!("  messages:    {}", lead.conversation.len()));
    }
    lines.join("\n")
}

pub fn stats_block(stats: &PipelineStats) -> String {
    let mut lines = vec![
        format!("total leads:     {}", stats.total),
        format!("conversion rate: {}%", stats.conversion_rate),
        format!("open pipeline:   {}", money(stats.pipeline_value)),
        format!("won value:       {}", money(stats.won_value)),
        format!(
            "temperature:     {} hot / {} warm / {} cold",
            stats.hot, stats.warm, stats.cold
        ),
    ];
    for status in LeadStatus::ALL {
        lines.push(format!("  {:<16} {}", status.label(), stats.count(status)));
    }
    lines.join("\n")
}

pub fn project_line(project: &Project) -> String {
    let progress = project
        .progress
        .map(|p| format!("{p:.0}%"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{:<5} {:<14} {:>5}  {}",
        project.id, project.status, progress, project.name
    )
}

pub fn timeline_line(event: &TimelineEvent) -> String {
    let when = event
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{when}  {:<12} {}", event.kind, event.description)
}

pub fn invoice_line(invoice: &Invoice) -> String {
    let due = invoice
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let proof = if invoice.proof_url.is_some() {
        "proof sent"
    } else {
        ""
    };
    format!(
        "#{:<5} {:<12} {:>14}  due {due}  {proof}",
        invoice.id,
        invoice.status,
        money(invoice.amount)
    )
    .trim_end()
    .to_string()
}

pub fn user_line(user: &UserProfile) -> String {
    match &user.role {
        Some(role) => format!("{} <{}> [{role}]", user.name, user.email),
        None => format!("{} <{}>", user.name, user.email),
    }
}

pub fn chat_block(reply: &ChatReply) -> String {
    match &reply.session_id {
        Some(session) => format!("{}\n(session {session})", reply.reply),
        None => reply.reply.clone(),
    }
}

/// One human-readable line per difference between two published snapshots.
pub fn describe_changes(prev: &LeadSnapshot, next: &LeadSnapshot) -> Vec<String> {
    let mut changes = Vec::new();
    for lead in &next.leads {
        match prev.lead(lead.id) {
            None => changes.push(format!("+ {}", lead_line(lead))),
            Some(old) if old.status != lead.status => changes.push(format!(
                "~ #{} {}: {} -> {}",
                lead.id,
                lead.name,
                old.status.label(),
                lead.status.label()
            )),
            Some(old) if old != lead => changes.push(format!("~ {}", lead_line(lead))),
            Some(_) => {}
        }
    }
    for lead in &prev.leads {
        if next.lead(lead.id).is_none() {
            changes.push(format!("- #{} {}", lead.id, lead.name));
        }
    }
    if next.error != prev.error {
        if let Some(error) = &next.error {
            changes.push(format!("! {error}"));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: i64, status: LeadStatus) -> Lead {
        let mut lead = Lead::new(id, format!("Lead {id}"));
        lead.status = status;
        lead
    }

    #[test]
    fn lead_line_shows_company_when_present() {
        let mut acme = lead(7, LeadStatus::Qualified);
        acme.company = Some("Acme".to_string());
        let line = lead_line(&acme);
        assert!(line.starts_with("#7"));
        assert!(line.contains("Qualificado"));
        assert!(line.ends_with("Lead 7 (Acme)"));
    }

    #[test]
    fn snapshot_changes_are_listed() {
        let prev = LeadSnapshot {
            leads: vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)],
            ..LeadSnapshot::default()
        };
        let next = LeadSnapshot {
            leads: vec![lead(1, LeadStatus::Won), lead(3, LeadStatus::New)],
            error: Some("Failed to load leads".to_string()),
            ..LeadSnapshot::default()
        };
        let changes = describe_changes(&prev, &next);
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0], "~ #1 Lead 1: Novo -> Ganho");
        assert!(changes[1].starts_with("+ #3"));
        assert_eq!(changes[2], "- #2 Lead 2");
        assert_eq!(changes[3], "! Failed to load leads");
        assert!(describe_changes(&next, &next).is_empty());
    }

    #[test]
    fn stats_block_lists_every_stage() {
        let block = stats_block(&PipelineStats::default());
        assert!(block.contains("conversion rate: 0%"));
        assert_eq!(block.lines().count(), 5 + LeadStatus::ALL.len());
    }
}
