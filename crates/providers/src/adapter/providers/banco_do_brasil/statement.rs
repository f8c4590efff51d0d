//! Checking account statements (extratos API).

use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};

use crate::charge::{EntryDirection, StatementData, StatementEntry, StatementRequest};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page the extratos API serves.
pub const MAX_PAGE_SIZE: u32 = 200;

/// BB encodes dates as the integer DDMMYYYY, without a leading zero.
pub fn encode_date(date: NaiveDate) -> u64 {
    u64::from(date.day()) * 1_000_000 + u64::from(date.month()) * 10_000 + date.year() as u64
}

pub fn decode_date(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if raw == 0 {
        return None;
    }
    let day = (raw / 1_000_000) as u32;
    let month = ((raw / 10_000) % 100) as u32;
    let year = (raw % 10_000) as i32;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn statement_query(request: &StatementRequest) -> Vec<(&'static str, String)> {
    let page = request.page.unwrap_or(1);
    let page_size = request.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    vec![
        ("dataInicioSolicitacao", encode_date(request.start_date).to_string()),
        ("dataFimSolicitacao", encode_date(request.end_date).to_string()),
        ("numeroPaginaSolicitacao", page.to_string()),
        ("quantidadeRegistroPaginaSolicitacao", page_size.to_string()),
    ]
}

fn entry(raw: &Value) -> StatementEntry {
    let amount = raw
        .get("valorLancamento")
        .and_then(Value::as_f64)
        .unwrap_or_default();
    let direction = match raw.get("indicadorSinalLancamento").and_then(Value::as_str) {
        Some(sign) if sign.eq_ignore_ascii_case("D") => EntryDirection::Debit,
        Some(_) => EntryDirection::Credit,
        None if amount < 0.0 => EntryDirection::Debit,
        None => EntryDirection::Credit,
    };
    let document = match raw.get("numeroDocumento") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) if n.as_u64() != Some(0) => Some(n.to_string()),
        _ => None,
    };
    StatementEntry {
        date: raw.get("dataLancamento").and_then(decode_date),
        description: raw
            .get("textoDescricaoHistorico")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        amount_cents: (amount.abs() * 100.0).round() as i64,
        direction,
        document,
    }
}

/// Normalize an extratos page. `listaLancamento` may be an array or, for a
/// single entry, a bare object.
pub fn normalize(raw: &Value, request: &StatementRequest) -> StatementData {
    let entries = match raw.get("listaLancamento") {
        Some(Value::Array(items)) => items.iter().map(entry).collect(),
        Some(item @ Value::Object(_)) => vec![entry(item)],
        _ => Vec::new(),
    };
    let page = raw
        .get("numeroPaginaAtual")
        .and_then(Value::as_u64)
        .map(|p| p as u32)
        .unwrap_or(request.page.unwrap_or(1));
    let total_pages = raw
        .get("quantidadeTotalPagina")
        .and_then(Value::as_u64)
        .map(|p| p as u32)
        .unwrap_or(page);
    StatementData {
        page,
        total_pages,
        total_records: raw.get("quantidadeTotalRegistro").and_then(Value::as_u64),
        entries,
    }
}

/// Placeholder shape returned when the account has no movement in the window.
pub fn empty_page(request: &StatementRequest) -> Value {
    json!({
        "numeroPaginaAtual": request.page.unwrap_or(1),
        "quantidadeTotalPagina": 0,
        "quantidadeTotalRegistro": 0,
        "listaLancamento": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StatementRequest {
        StatementRequest {
            agency: None,
            account: None,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            page: None,
            page_size: Some(500),
        }
    }

    #[test]
    fn test_date_encoding() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(encode_date(date), 5_032_026);
        assert_eq!(decode_date(&json!(5_032_026)), Some(date));
        assert_eq!(decode_date(&json!("15032026")), NaiveDate::from_ymd_opt(2026, 3, 15));
        assert_eq!(decode_date(&json!(0)), None);
    }

    #[test]
    fn test_query_clamps_page_size() {
        let query = statement_query(&request());
        assert!(query.contains(&("dataInicioSolicitacao", "1032026".to_string())));
        assert!(query.contains(&("numeroPaginaSolicitacao", "1".to_string())));
        assert!(query.contains(&("quantidadeRegistroPaginaSolicitacao", "200".to_string())));
    }

    #[test]
    fn test_normalize_array() {
        let raw = json!({
            "numeroPaginaAtual": 1,
            "quantidadeTotalPagina": 3,
            "quantidadeTotalRegistro": 120,
            "listaLancamento": [
                {"dataLancamento": 2032026, "textoDescricaoHistorico": "Pix - Recebido ",
                 "valorLancamento": 150.5, "indicadorSinalLancamento": "C", "numeroDocumento": 12345},
                {"dataLancamento": 3032026, "textoDescricaoHistorico": "Tarifa",
                 "valorLancamento": 12.9, "indicadorSinalLancamento": "D", "numeroDocumento": 0}
            ]
        });
        let data = normalize(&raw, &request());
        assert_eq!(data.total_pages, 3);
        assert_eq!(data.total_records, Some(120));
        assert_eq!(data.entries.len(), 2);
        assert_eq!(data.entries[0].description, "Pix - Recebido");
        assert_eq!(data.entries[0].amount_cents, 15050);
        assert_eq!(data.entries[0].document.as_deref(), Some("12345"));
        assert_eq!(data.entries[1].direction, EntryDirection::Debit);
        assert_eq!(data.entries[1].document, None);
    }

    #[test]
    fn test_normalize_single_object() {
        let raw = json!({
            "listaLancamento": {"dataLancamento": 0, "textoDescricaoHistorico": "Saldo Anterior",
                                "valorLancamento": 1000.0, "indicadorSinalLancamento": "C"}
        });
        let data = normalize(&raw, &request());
        assert_eq!(data.page, 1);
        assert_eq!(data.total_pages, 1);
        assert_eq!(data.entries.len(), 1);
        assert_eq!(data.entries[0].date, None);
    }

    #[test]
    fn test_empty_page_normalizes() {
        let data = normalize(&empty_page(&request()), &request());
        assert!(data.entries.is_empty());
        assert_eq!(data.total_records, Some(0));
    }
}
