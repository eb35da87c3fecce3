use crate::{Lead, LeadStatus, Temperature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dashboard aggregates. Served by `GET /leads/stats`, or rebuilt locally from
/// the store snapshot when that call fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineStats {
    #[serde(default)]
    pub total: usize,
    #[serde(default, rename = "por_status")]
    pub by_status: BTreeMap<LeadStatus, usize>,
    #[serde(default, rename = "quentes")]
    pub hot: usize,
    #[serde(default, rename = "mornos")]
    pub warm: usize,
    #[serde(default, rename = "frios")]
    pub cold: usize,
    #[serde(default, rename = "valor_pipeline")]
    pub pipeline_value: f64,
    #[serde(default, rename = "valor_ganho")]
    pub won_value: f64,
    #[serde(default, rename = "taxa_conversao")]
    pub conversion_rate: u32,
}

impl PipelineStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let mut stats = PipelineStats {
            total: leads.len(),
            ..PipelineStats::default()
        };
        for lead in leads {
            *stats.by_status.entry(lead.status).or_insert(0) += 1;
            match lead.temperature {
                Temperature::Hot => stats.hot += 1,
                Temperature::Warm => stats.warm += 1,
                Temperature::Cold => stats.cold += 1,
            }
            match lead.status {
                LeadStatus::Won => stats.won_value += lead.estimated_value,
                LeadStatus::Lost => {}
                _ => stats.pipeline_value += lead.estimated_value,
            }
        }
        stats.conversion_rate = conversion_rate(stats.count(LeadStatus::Won), stats.total);
        stats
    }

    pub fn count(&self, status: LeadStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// `round(100 * won / total)`, zero for an empty pipeline.
pub fn conversion_rate(won: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * won as f64 / total as f64).round() as u32
}

/// Brazilian real formatting: `R$ 1.234,56`.
pub fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{sign}R$ {grouped},{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: i64, status: LeadStatus, temperature: Temperature, value: f64) -> Lead {
        let mut lead = Lead::new(id, format!("lead {id}"));
        lead.status = status;
        lead.temperature = temperature;
        lead.estimated_value = value;
        lead
    }

    #[test]
    fn brl_uses_dot_grouping_and_comma_decimals() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(-950.5), "-R$ 950,50");
    }

    #[test]
    fn conversion_rate_rounds_to_nearest_percent() {
        assert_eq!(conversion_rate(0, 0), 0);
        assert_eq!(conversion_rate(1, 3), 33);
        assert_eq!(conversion_rate(2, 3), 67);
        assert_eq!(conversion_rate(1, 8), 13);
        assert_eq!(conversion_rate(5, 5), 100);
    }

    #[test]
    fn conversion_rate_matches_formula_for_small_pipelines() {
        for total in 1..=40usize {
            for won in 0..=total {
                let expected = (100.0 * won as f64 / total as f64).round() as u32;
                assert_eq!(conversion_rate(won, total), expected, "{won}/{total}");
            }
        }
    }

    #[test]
    fn from_leads_aggregates_counts_and_values() {
        let leads = vec![
            lead(1, LeadStatus::New, Temperature::Hot, 100.0),
            lead(2, LeadStatus::Won, Temperature::Warm, 500.0),
            lead(3, LeadStatus::Lost, Temperature::Cold, 50.0),
            lead(4, LeadStatus::Qualified, Temperature::Hot, 250.0),
        ];
        let stats = PipelineStats::from_leads(&leads);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(LeadStatus::Won), 1);
        assert_eq!(stats.count(LeadStatus::MeetingScheduled), 0);
        assert_eq!((stats.hot, stats.warm, stats.cold), (2, 1, 1));
        assert_eq!(stats.pipeline_value, 350.0);
        assert_eq!(stats.won_value, 500.0);
        assert_eq!(stats.conversion_rate, 25);
    }

    #[test]
    fn server_payload_uses_status_keys() {
        let stats: PipelineStats = serde_json::from_str(
            r#"{"total": 3, "por_status": {"novo": 2, "ganho": 1}, "taxa_conversao": 33}"#,
        )
        .expect("parse stats");
        assert_eq!(stats.count(LeadStatus::New), 2);
        assert_eq!(stats.count(LeadStatus::Won), 1);
        assert_eq!(stats.conversion_rate, 33);
    }
}
