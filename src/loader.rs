//! Text-format loader for subgraph files.
//!
//! The format is line-oriented: `O<type>\t<label>\t<flag>` opens an object,
//! `S<type>\t<label>` lines attach states to it (a third field carries either
//! a `{comma,separated}` ingredient list or a `[related object]`),
//! `M<type>\t<label>\t<times>` closes the input section and opens the output
//! section, and `//` terminates the functional unit. A `!` on an object line
//! marks the query target of the file.

use std::path::Path;

use crate::error::{LoadError, ParseError};
use crate::graph::node::{ObjectNode, State};
use crate::graph::{FoonGraph, RawMotion, RawObject, RawUnit};
use crate::types::Entity;

/// Parses a whole subgraph file into raw functional-unit records.
pub fn parse_subgraph(text: &str) -> Result<Vec<RawUnit>, ParseError> {
    let mut units = Vec::new();
    let mut current = RawUnit::default();
    let mut pending: Option<RawObject> = None;
    let mut reading_inputs = true;

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("# ") {
            continue;
        }

        if line.starts_with("//") {
            flush_object(&mut current, &mut pending, reading_inputs);
            if !current.is_empty() {
                units.push(std::mem::take(&mut current));
            } else {
                current = RawUnit::default();
            }
            reading_inputs = true;
        } else if let Some(rest) = line.strip_prefix('O') {
            flush_object(&mut current, &mut pending, reading_inputs);
            pending = Some(parse_object_line(rest, line, line_no)?);
        } else if let Some(rest) = line.strip_prefix('S') {
            let object = pending
                .as_mut()
                .ok_or_else(|| ParseError::new(line_no, "state line without an object"))?;
            parse_state_line(rest, object, line_no)?;
        } else if let Some(rest) = line.strip_prefix('M') {
            flush_object(&mut current, &mut pending, reading_inputs);
            parse_motion_line(rest, &mut current, line_no)?;
            reading_inputs = false;
        } else {
            return Err(ParseError::new(
                line_no,
                format!("unrecognized line: {line}"),
            ));
        }
    }

    // a trailing unit without a closing delimiter is still taken
    flush_object(&mut current, &mut pending, reading_inputs);
    if !current.is_empty() {
        units.push(current);
    }

    Ok(units)
}

/// Parses a subgraph file and appends every unit to the graph. Returns the
/// number of raw units read; duplicates are collapsed per level by the
/// hierarchy builder. Indices are left for the caller to rebuild.
pub fn load_subgraph(graph: &mut FoonGraph, text: &str) -> Result<usize, ParseError> {
    let units = parse_subgraph(text)?;
    for unit in &units {
        // parse_subgraph only emits non-empty units
        graph
            .append_unit(unit)
            .map_err(|e| ParseError::new(0, e.to_string()))?;
    }
    log::info!("[loader] appended {} functional units", units.len());
    Ok(units.len())
}

/// Reads a subgraph file from disk and appends its units to the graph.
pub fn load_subgraph_path(
    graph: &mut FoonGraph,
    path: impl AsRef<Path>,
) -> Result<usize, LoadError> {
    let text = std::fs::read_to_string(path)?;
    Ok(load_subgraph(graph, &text)?)
}

/// Reads a kitchen-item file from disk.
pub fn load_object_list_path(path: impl AsRef<Path>) -> Result<Vec<ObjectNode>, LoadError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_object_list(&text)?)
}

/// Parses a kitchen-item list: a sequence of object/state line groups in the
/// same format as a subgraph file, without motions or delimiters. The result
/// is an environment for the retrieval algorithms.
pub fn parse_object_list(text: &str) -> Result<Vec<ObjectNode>, ParseError> {
    let mut items = Vec::new();
    let mut pending: Option<RawObject> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('O') {
            if let Some(done) = pending.take() {
                items.push(raw_to_object(done));
            }
            pending = Some(parse_object_line(rest, line, line_no)?);
        } else if let Some(rest) = line.strip_prefix('S') {
            let object = pending
                .as_mut()
                .ok_or_else(|| ParseError::new(line_no, "state line without an object"))?;
            parse_state_line(rest, object, line_no)?;
        } else {
            return Err(ParseError::new(
                line_no,
                format!("unrecognized line: {line}"),
            ));
        }
    }
    if let Some(done) = pending.take() {
        items.push(raw_to_object(done));
    }

    Ok(items)
}

fn raw_to_object(raw: RawObject) -> ObjectNode {
    let mut o = ObjectNode::new(raw.object_type, raw.label);
    for s in raw.states {
        o.add_state(s);
    }
    o.ingredients = raw
        .ingredients
        .into_iter()
        .map(crate::graph::node::Ingredient::Label)
        .collect();
    o
}

fn flush_object(unit: &mut RawUnit, pending: &mut Option<RawObject>, reading_inputs: bool) {
    if let Some(object) = pending.take() {
        if reading_inputs {
            unit.inputs.push(object);
        } else {
            unit.outputs.push(object);
        }
    }
}

fn parse_object_line(rest: &str, full_line: &str, line_no: usize) -> Result<RawObject, ParseError> {
    let parts: Vec<&str> = rest.split('\t').collect();
    if parts.len() < 2 {
        return Err(ParseError::new(line_no, "object line needs a type and label"));
    }
    let object_type: i32 = parts[0]
        .trim_end_matches('!')
        .parse()
        .map_err(|_| ParseError::new(line_no, format!("bad object type '{}'", parts[0])))?;
    let active = parts
        .get(2)
        .and_then(|p| p.trim_end_matches('!').trim().parse::<i32>().ok())
        .map(|d| d != 0)
        .unwrap_or(false);
    Ok(RawObject {
        object_type,
        label: parts[1].trim_end_matches('!').to_string(),
        is_goal: full_line.contains('!'),
        active,
        ..Default::default()
    })
}

fn parse_state_line(rest: &str, object: &mut RawObject, line_no: usize) -> Result<(), ParseError> {
    let parts: Vec<&str> = rest.split('\t').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return Err(ParseError::new(line_no, "state line needs a type and label"));
    }
    let state_type: i32 = parts[0]
        .parse()
        .map_err(|_| ParseError::new(line_no, format!("bad state type '{}'", parts[0])))?;
    let mut state = State::new(state_type, parts[1].trim());

    if let Some(extra) = parts.get(2) {
        if let Some(list) = extra.split('{').nth(1).and_then(|s| s.split('}').next()) {
            let mut ingredients: Vec<String> = list
                .split(',')
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            ingredients.sort();
            object.ingredients = ingredients;
        } else if let Some(related) = extra.split('[').nth(1).and_then(|s| s.split(']').next()) {
            state = state.with_related(related.trim());
        } else {
            log::warn!("[loader] line {line_no}: unexpected extra field '{extra}'");
        }
    }

    object.states.push(state);
    Ok(())
}

fn parse_motion_line(rest: &str, unit: &mut RawUnit, line_no: usize) -> Result<(), ParseError> {
    let parts: Vec<&str> = rest.split('\t').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return Err(ParseError::new(line_no, "motion line needs a type and label"));
    }
    let motion_type: i32 = parts[0]
        .parse()
        .map_err(|_| ParseError::new(line_no, format!("bad motion type '{}'", parts[0])))?;
    unit.motion = Some(RawMotion {
        motion_type,
        label: parts[1].trim().to_string(),
        taxonomy_code: None,
    });

    // third field: `<start,end>`, `<Assumed>`, or bare start/end fields; an
    // entity name in that position means the unit carries no time annotation
    let mut tail = 2;
    if let Some(&field) = parts.get(2) {
        if field.starts_with('<') {
            let inner = field.trim_start_matches('<').trim_end_matches('>');
            let mut split = inner.splitn(2, ',');
            if let (Some(start), Some(end)) = (split.next(), split.next()) {
                unit.times = Some((start.to_string(), end.to_string()));
            }
            tail = 3;
        } else if Entity::parse(field).is_none() {
            if field == "Assumed" {
                tail = 3;
            } else {
                if parts.get(3).is_some_and(|p| Entity::parse(p).is_none()) {
                    unit.times = Some((field.to_string(), parts[3].to_string()));
                }
                tail = 4;
            }
        }
    }

    if let (Some(entity), Some(rate)) = (parts.get(tail), parts.get(tail + 1)) {
        unit.entity = Entity::parse(entity);
        let rate: f64 = rate
            .parse()
            .map_err(|_| ParseError::new(line_no, format!("bad success rate '{rate}'")))?;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ParseError::new(
                line_no,
                format!("success rate {rate} outside [0, 1]"),
            ));
        }
        unit.success_rate = Some(rate);
    }
    Ok(())
}
