//! Reply text for a parsed race.
//!
//! The pick is a simple exhibition-time heuristic, advisory only.

use std::cmp::Ordering;

use crate::types::{Conditions, RaceInfo, RacerEntry};

/// Trifecta combination (1st, 2nd, 3rd)
pub type Trifecta = (u8, u8, u8);

const MAX_MAIN: usize = 6;
const MAX_COVER: usize = 8;

/// Tentative favorite and how it was chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Favorite {
    /// Lowest exhibition time
    Exhibition { lane: u8, time: f64 },
    /// No exhibition times yet, innermost lane
    Inside { lane: u8 },
}

impl Favorite {
    pub fn lane(&self) -> u8 {
        match self {
            Favorite::Exhibition { lane, .. } | Favorite::Inside { lane } => *lane,
        }
    }
}

/// Lanes ordered by exhibition time, fastest first; ties go to the inner lane
pub fn exhibition_ranking(entries: &[RacerEntry]) -> Vec<(u8, f64)> {
    let mut timed: Vec<(u8, f64)> = entries
        .iter()
        .filter_map(|e| e.exhibition_time.map(|t| (e.lane, t)))
        .collect();
    timed.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    timed
}

/// Lanes ordered by start exhibition timing; flying starts rank last
pub fn start_ranking(entries: &[RacerEntry]) -> Vec<(u8, f64)> {
    let mut timed: Vec<(u8, f64)> = entries
        .iter()
        .filter_map(|e| e.start_timing.map(|t| (e.lane, t)))
        .collect();
    timed.sort_by(|a, b| match (a.1 < 0.0, b.1 < 0.0) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.1.abs().total_cmp(&b.1.abs()).then(a.0.cmp(&b.0)),
    });
    timed
}

/// Pick the tentative favorite, `None` only when there are no entries
pub fn favorite(entries: &[RacerEntry]) -> Option<Favorite> {
    if let Some(&(lane, time)) = exhibition_ranking(entries).first() {
        return Some(Favorite::Exhibition { lane, time });
    }
    entries
        .iter()
        .map(|e| e.lane)
        .min()
        .map(|lane| Favorite::Inside { lane })
}

/// Main and cover trifectas built around the favorite
pub fn build_picks(entries: &[RacerEntry], axis: u8) -> (Vec<Trifecta>, Vec<Trifecta>) {
    let others: Vec<u8> = entries
        .iter()
        .map(|e| e.lane)
        .filter(|&lane| lane != axis)
        .collect();

    // Favorite first, the next three as partners
    let partners = &others[..others.len().min(3)];
    let mut main = Vec::new();
    for &b in partners {
        for &c in partners {
            if b != c {
                main.push((axis, b, c));
            }
        }
    }
    main.truncate(MAX_MAIN);

    // Favorite second
    let wide = &others[..others.len().min(4)];
    let mut cover = Vec::new();
    for &a in wide {
        for &c in wide {
            if c != a {
                cover.push((a, axis, c));
            }
        }
    }

    // Outside (4th lane) attack
    let has = |lane: u8| entries.iter().any(|e| e.lane == lane);
    if axis != 4 && axis != 1 && has(4) && has(1) {
        cover.push((4, axis, 1));
        cover.push((axis, 4, 1));
    }

    let mut seen: Vec<Trifecta> = main.clone();
    cover.retain(|t| {
        if seen.contains(t) {
            false
        } else {
            seen.push(*t);
            true
        }
    });
    cover.truncate(MAX_COVER);

    (main, cover)
}

/// Full summary reply for a race
pub fn build_summary(info: &RaceInfo, source_url: &str) -> String {
    let mut lines = vec![format!("📍 {}", info.id.title()), "――――――――――".to_string()];

    if let Some(conditions) = format_conditions(&info.conditions) {
        lines.push(conditions);
    }

    for entry in &info.entries {
        lines.push(format_entry(entry));
    }
    lines.push(String::new());

    let ranking = exhibition_ranking(&info.entries);
    if ranking.is_empty() {
        lines.push("展示タイム: 未発表".to_string());
    } else {
        lines.push(format!("展示タイム上位: {}", join_lanes(&ranking)));
    }

    let starts = start_ranking(&info.entries);
    if !starts.is_empty() {
        lines.push(format!("ST上位: {}", join_lanes(&starts)));
    }

    if let Some(fav) = favorite(&info.entries) {
        lines.push(format_favorite(info, fav));

        let (main, cover) = build_picks(&info.entries, fav.lane());
        lines.push(String::new());
        lines.push(format!("🎯本線（{}点）", main.len()));
        lines.push(format_tickets(&main));
        lines.push(format!("🔸抑え（{}点）", cover.len()));
        lines.push(format_tickets(&cover));
        lines.push(String::new());
        lines.push(format!("📝展開メモ：{}", comment(fav)));
    }

    lines.push("※展示タイムからの簡易予想です。参考程度にどうぞ。".to_string());
    lines.push(format!("(src: 公式 / {})", source_url));

    lines.join("\n")
}

fn format_conditions(c: &Conditions) -> Option<String> {
    if c.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(w) = &c.weather {
        parts.push(format!("天候{}", w));
    }
    if let Some(t) = c.air_temp {
        parts.push(format!("気温{:.1}℃", t));
    }
    if let Some(w) = c.wind_speed {
        parts.push(format!("風{}m", w));
    }
    if let Some(t) = c.water_temp {
        parts.push(format!("水温{:.1}℃", t));
    }
    if let Some(h) = c.wave_height {
        parts.push(format!("波{}cm", h));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("🌤 {}", parts.join(" ")))
}

fn format_entry(entry: &RacerEntry) -> String {
    let mut line = format!("{}号艇 {}", entry.lane, entry.name);
    match entry.exhibition_time {
        Some(t) => line.push_str(&format!(" 展示{:.2}", t)),
        None => line.push_str(" 展示-"),
    }
    if let Some(tilt) = entry.tilt {
        line.push_str(&format!(" チルト{}", tilt));
    }
    if let Some(st) = entry.start_timing {
        line.push_str(&format!(" ST{}", format_st(st)));
    }
    if let Some(rate) = entry.motor_rate {
        line.push_str(&format!(" M{:.1}%", rate));
    }
    line
}

/// `.12`, or `F.05` for a flying start
fn format_st(st: f64) -> String {
    let digits = format!("{:.2}", st.abs());
    let digits = digits.trim_start_matches('0');
    if st < 0.0 {
        format!("F{}", digits)
    } else {
        digits.to_string()
    }
}

fn format_favorite(info: &RaceInfo, fav: Favorite) -> String {
    let name = info
        .entry(fav.lane())
        .map(|e| e.name.as_str())
        .unwrap_or_default();
    match fav {
        Favorite::Exhibition { lane, time } => {
            format!("◎暫定本命: {}号艇 {} (展示{:.2}が最速)", lane, name, time)
        }
        Favorite::Inside { lane } => {
            format!("◎暫定本命: {}号艇 {} (展示タイム未発表のためイン重視)", lane, name)
        }
    }
}

fn format_tickets(tickets: &[Trifecta]) -> String {
    if tickets.is_empty() {
        return "（データ不足）".to_string();
    }
    tickets
        .iter()
        .map(|(a, b, c)| format!("・{}-{}-{}", a, b, c))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_lanes(ranking: &[(u8, f64)]) -> String {
    ranking
        .iter()
        .take(3)
        .map(|(lane, _)| lane.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

fn comment(fav: Favorite) -> String {
    match fav.lane() {
        1 => "イン逃げ本線。外が残る展開なら3着は荒れも。".to_string(),
        4 => "カドからの一撃に注意。1マーク混戦なら道中で逆転も。".to_string(),
        lane => format!("{}号艇の足が目立つ。スタートが決まれば押し切りまで。", lane),
    }
}
