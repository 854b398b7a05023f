//! Object tree dumping for poking at what the changelog endpoint (or anything
//! else graph shaped) actually handed us.
//!
//! The walk carries the list of nodes on the path from the root.  A member
//! that points back at one of them is printed as `<cycle>` and not followed,
//! and nothing deeper than `max_depth` is expanded, so arbitrary graphs are
//! safe to dump.

use serde_json::Value;

/// Something we can walk: nodes are identified by `Id`, and each node has a
/// one line description plus named members.
pub trait ObjectGraph {
    type Id: Copy + Eq;

    fn describe(&self, id: Self::Id) -> String;
    fn members(&self, id: Self::Id) -> Vec<(String, Self::Id)>;
}

/// Dump the tree reachable from `root` as indented `name: description` lines.
pub fn dump_object_tree<G: ObjectGraph>(graph: &G, root: G::Id, name: &str, max_depth: usize) -> String {
    let mut out = String::new();
    let mut parents = Vec::new();
    dump_node(graph, root, name, 0, max_depth, &mut parents, &mut out);
    out
}

fn dump_node<G: ObjectGraph>(
    graph: &G,
    id: G::Id,
    name: &str,
    depth: usize,
    max_depth: usize,
    parents: &mut Vec<G::Id>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    if parents.contains(&id) {
        out.push_str(&format!("{}{}: <cycle>\n", indent, name));
        return;
    }
    out.push_str(&format!("{}{}: {}\n", indent, name, graph.describe(id)));

    let members = graph.members(id);
    if members.is_empty() {
        return;
    }
    if depth >= max_depth {
        out.push_str(&format!("{}  ... {} more\n", indent, members.len()));
        return;
    }

    parents.push(id);
    for (member_name, member) in members {
        dump_node(graph, member, &member_name, depth + 1, max_depth, parents, out);
    }
    parents.pop();
}

/// `ObjectGraph` over a JSON document.  Node ids index a flattened copy of the
/// tree built up front.
pub struct JsonGraph<'a> {
    nodes: Vec<(&'a Value, Vec<(String, usize)>)>,
}

impl<'a> JsonGraph<'a> {
    pub fn new(root: &'a Value) -> Self {
        let mut graph = JsonGraph { nodes: Vec::new() };
        graph.add(root);
        graph
    }

    /// Id of the root passed to `new`.
    pub fn root(&self) -> usize {
        0
    }

    fn add(&mut self, value: &'a Value) -> usize {
        let id = self.nodes.len();
        self.nodes.push((value, Vec::new()));
        let members = match value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), self.add(v))).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("[{}]", i), self.add(v)))
                .collect(),
            _ => Vec::new(),
        };
        self.nodes[id].1 = members;
        id
    }
}

impl<'a> ObjectGraph for JsonGraph<'a> {
    type Id = usize;

    fn describe(&self, id: usize) -> String {
        match self.nodes[id].0 {
            Value::Object(map) => format!("object ({} keys)", map.len()),
            Value::Array(items) => format!("array ({} items)", items.len()),
            scalar => scalar.to_string(),
        }
    }

    fn members(&self, id: usize) -> Vec<(String, usize)> {
        self.nodes[id].1.clone()
    }
}
