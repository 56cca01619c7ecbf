//! End-to-end pipeline tests for the render/assembly engine.
//!
//! These exercise the published behavioral contracts across module
//! boundaries: grammar resolution through the binder, bottom-up tree
//! composition, and the assemble-then-reinstantiate round trip.

#[cfg(test)]
mod tests {
    use crate::{
        assemble, markup_extension, render_tree, Fragment, Node, ParamDecl, RenameTable,
        RenderError,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn fragment(id: &str, markup: &str, params: &[&str]) -> Fragment {
        Fragment {
            id: id.to_string(),
            markup: markup.to_string(),
            style: String::new(),
            script: String::new(),
            params: params
                .iter()
                .map(|n| ParamDecl {
                    name: n.to_string(),
                    sample: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_toggle_and_literal_through_full_render() {
        let frag = fragment(
            "banner",
            "{%visible pre {%x%} visible%}tail",
            &["visible", "x"],
        );

        let hidden = render_tree(vec![Node::new("n", "", 0)
            .with_fragment(frag.clone())
            .bind("visible", json!(""))
            .bind("x", json!("5"))])
        .unwrap();
        assert_eq!(hidden[0].buffers.markup, "tail");

        let shown = render_tree(vec![Node::new("n", "", 0)
            .with_fragment(frag)
            .bind("visible", json!("yes"))
            .bind("x", json!("5"))])
        .unwrap();
        assert_eq!(shown[0].buffers.markup, "pre 5 tail");
    }

    #[test]
    fn test_match_block_through_full_render() {
        let frag = fragment(
            "switch",
            "{%mode:a|b kept mode:a|b%}{%mode:c lost mode:c%}",
            &["mode"],
        );

        let ab = render_tree(vec![Node::new("n", "", 0)
            .with_fragment(frag.clone())
            .bind("mode", json!("ab"))])
        .unwrap();
        assert_eq!(ab[0].buffers.markup, "kept");

        let zzz = render_tree(vec![Node::new("n", "", 0)
            .with_fragment(frag)
            .bind("mode", json!("zzz"))])
        .unwrap();
        assert_eq!(zzz[0].buffers.markup, "");
    }

    #[test]
    fn test_reorder_is_independent_of_order_values() {
        let parent = fragment("list", "{%children%}", &[]);
        let item = fragment("item", "idx={%childIndex%}", &[]);
        let nodes = vec![
            Node::new("root", "", 0).with_fragment(parent),
            Node::new("c5", "root", 5).with_fragment(item.clone()),
            Node::new("c1", "root", 1).with_fragment(item.clone()),
            Node::new("c3", "root", 3).with_fragment(item),
        ];
        let roots = render_tree(nodes).unwrap();
        assert_eq!(roots[0].buffers.markup, "idx=0\nidx=1\nidx=2");
    }

    #[test]
    fn test_duplicate_order_aborts_whole_batch() {
        let parent = fragment("list", "{%children%}", &[]);
        let item = fragment("item", "x", &[]);
        let nodes = vec![
            Node::new("root", "", 0).with_fragment(parent),
            Node::new("left", "root", 2).with_fragment(item.clone()),
            Node::new("right", "root", 2).with_fragment(item),
        ];
        match render_tree(nodes) {
            Err(RenderError::DuplicateOrder { first, second, .. }) => {
                let mut pair = [first, second];
                pair.sort();
                assert_eq!(pair, ["left".to_string(), "right".to_string()]);
            }
            other => panic!("expected DuplicateOrder, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_round_trip_namespaces_descendants() {
        let nodes = vec![
            Node::new("R", "", 0)
                .with_fragment(fragment("card", "<div id=\"{%ID%}\">{%children%}</div>", &[])),
            Node::new("C", "R", 1)
                .with_fragment(fragment(
                    "swatch",
                    "<b id=\"{%ID%}\" class=\"{%color%}\"></b>",
                    &["color"],
                ))
                .bind("color", json!("red")),
        ];
        let mut table = RenameTable::new();
        table.insert("color".to_string(), "c_color".to_string());
        let mut renames = HashMap::new();
        renames.insert("C".to_string(), table);

        let frag = assemble(nodes, &renames).unwrap().into_fragment(
            "merged",
            vec![ParamDecl {
                name: "c_color".to_string(),
                sample: String::new(),
            }],
        );

        for root_id in ["X", "Y"] {
            let roots = render_tree(vec![Node::new(root_id, "", 0)
                .with_fragment(frag.clone())
                .bind("c_color", json!("blue"))])
            .unwrap();
            let markup = &roots[0].buffers.markup;
            assert!(markup.contains(&format!("id=\"{}_C\"", root_id)));
            assert!(markup.contains("class=\"blue\""));
        }
    }

    #[test]
    fn test_open_slot_survives_merge() {
        let nodes = vec![Node::new("R", "", 0).with_fragment(fragment(
            "shell",
            "<div>{%children%}</div>",
            &[],
        ))];
        let mut table = RenameTable::new();
        table.insert("children".to_string(), String::new());
        let mut renames = HashMap::new();
        renames.insert("R".to_string(), table);

        let merged = assemble(nodes, &renames).unwrap();
        assert_eq!(merged.node.buffers.markup, "<div>{%children%}</div>");
    }

    #[test]
    fn test_extension_selection_from_rendered_markup() {
        let static_page = render_tree(vec![
            Node::new("n", "", 0).with_fragment(fragment("p", "<div>hi</div>", &[]))
        ])
        .unwrap();
        assert_eq!(markup_extension(&static_page[0].buffers.markup), "html");

        let dynamic_page = render_tree(vec![Node::new("n", "", 0).with_fragment(fragment(
            "p",
            "<div><?= now() ?></div>",
            &[],
        ))])
        .unwrap();
        assert_eq!(markup_extension(&dynamic_page[0].buffers.markup), "php");
    }
}
