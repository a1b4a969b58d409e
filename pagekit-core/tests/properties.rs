//! Property tests for the mutation engine and record codec.

use pagekit_core::codec::{decode_settings, decode_styles, encode_settings, encode_styles};
use pagekit_core::{
    assemble, Command, Element, ElementId, ElementPatch, ElementType, Forest, Settings, StyleMap,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    CreateRoot(usize),
    CreateChild(usize, usize),
    Update(usize, String, f64, (String, String)),
    Delete(usize),
    Swap(usize, usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    let ty = 0..ElementType::ALL.len();
    prop_oneof![
        ty.clone().prop_map(Op::CreateRoot),
        (any::<usize>(), ty).prop_map(|(parent, ty)| Op::CreateChild(parent, ty)),
        (
            any::<usize>(),
            "[a-z ]{0,12}",
            -500.0f64..500.0,
            ("[a-z]{1,6}", "[a-z0-9#]{0,6}")
        )
            .prop_map(|(at, content, x, style)| Op::Update(at, content, x, style)),
        any::<usize>().prop_map(Op::Delete),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
    ]
}

fn pick(forest: &Forest, at: usize) -> Option<ElementId> {
    let all = forest.flatten();
    if all.is_empty() {
        return None;
    }
    Some(all[at % all.len()].id.clone())
}

fn to_command(forest: &Forest, op: &Op) -> Option<Command> {
    let new = |ty: usize| Element::new(ElementType::ALL[ty], "prop");
    Some(match op {
        Op::CreateRoot(ty) => Command::Create {
            element: new(*ty),
            parent_id: None,
        },
        Op::CreateChild(parent, ty) => Command::Create {
            element: new(*ty),
            parent_id: Some(pick(forest, *parent)?),
        },
        Op::Update(at, content, x, (name, value)) => Command::Update {
            id: pick(forest, *at)?,
            patch: ElementPatch::new()
                .content(content.clone())
                .position(*x, 0.0)
                .style(name.clone(), value.clone()),
        },
        Op::Delete(at) => Command::Delete {
            id: pick(forest, *at)?,
        },
        Op::Swap(a, b) => Command::Swap {
            first: pick(forest, *a)?,
            second: pick(forest, *b)?,
        },
    })
}

fn parents_are_consistent(forest: &Forest) -> bool {
    forest.roots().iter().all(|r| r.parent_id.is_none())
        && forest.iter().all(|element| {
            element
                .children()
                .iter()
                .all(|child| child.parent_id.as_ref() == Some(&element.id))
        })
}

proptest! {
    #[test]
    fn prop_every_mutation_keeps_the_forest_valid(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut forest = Forest::new();
        for op in &ops {
            let Some(command) = to_command(&forest, op) else { continue };
            if let Ok(applied) = command.apply(&forest) {
                forest = applied.forest;
            }
            prop_assert!(forest.validate().is_ok(), "invalid after {:?}", command.name());
            prop_assert!(parents_are_consistent(&forest));
        }
    }

    #[test]
    fn prop_compensation_restores_previous_forest(ops in prop::collection::vec(arb_op(), 1..30)) {
        let mut forest = Forest::new();
        for op in &ops {
            let Some(command) = to_command(&forest, op) else { continue };
            let Ok(applied) = command.apply(&forest) else { continue };
            let restored = applied.compensation.apply(&applied.forest).ok();
            prop_assert_eq!(restored.as_ref(), Some(&forest), "{} did not invert", command.name());
            forest = applied.forest;
        }
    }

    #[test]
    fn prop_empty_update_is_identity(
        ops in prop::collection::vec(arb_op(), 1..20),
        at in any::<usize>()
    ) {
        let mut forest = Forest::new();
        for op in &ops {
            if let Some(Ok(applied)) = to_command(&forest, op).map(|c| c.apply(&forest)) {
                forest = applied.forest;
            }
        }
        if let Some(id) = pick(&forest, at) {
            let after = pagekit_core::update(&forest, id.as_str(), &ElementPatch::new()).ok();
            prop_assert_eq!(after.as_ref(), Some(&forest));
        }
    }

    #[test]
    fn prop_swap_twice_is_identity(
        orders in prop::collection::vec(-50i64..50, 2..8),
        a in any::<usize>(),
        b in any::<usize>()
    ) {
        let roots = orders
            .iter()
            .enumerate()
            .map(|(i, order)| {
                Element::new(ElementType::Text, "p")
                    .with_id(format!("e{i}"))
                    .with_order(*order)
            })
            .collect();
        let forest = Forest::from_roots(roots).expect("valid");
        let first = format!("e{}", a % orders.len());
        let second = format!("e{}", b % orders.len());
        let once = pagekit_core::reorder_swap(&forest, &first, &second).expect("siblings");
        let twice = pagekit_core::reorder_swap(&once, &first, &second).expect("siblings");
        prop_assert_eq!(twice, forest);
    }

    #[test]
    fn prop_styles_blob_round_trips(
        styles in prop::collection::btree_map("[a-zA-Z-]{1,12}", ".{0,16}", 0..8)
    ) {
        let styles: StyleMap = styles;
        let blob = encode_styles(&styles).expect("encode");
        prop_assert_eq!(decode_styles(&blob).expect("decode"), styles);
    }

    #[test]
    fn prop_settings_blob_round_trips(
        entries in prop::collection::vec(("[a-z]{1,8}", any::<i32>(), any::<bool>()), 0..6)
    ) {
        let settings: Settings = entries
            .into_iter()
            .map(|(key, n, flag)| (key, serde_json::json!({ "n": n, "flag": flag })))
            .collect();
        let blob = encode_settings(&settings).expect("encode");
        prop_assert_eq!(decode_settings(Some(&blob)).expect("decode"), settings);
    }

    #[test]
    fn prop_records_reassemble_to_same_forest(ops in prop::collection::vec(arb_op(), 0..30)) {
        let mut forest = Forest::new();
        for op in &ops {
            if let Some(Ok(applied)) = to_command(&forest, op).map(|c| c.apply(&forest)) {
                forest = applied.forest;
            }
        }
        let records = forest.to_records().expect("encode");
        let assembled = assemble(records);
        prop_assert!(assembled.skipped.is_empty());
        prop_assert_eq!(assembled.forest.len(), forest.len());
        prop_assert!(assembled.forest.validate().is_ok());
        for element in &forest {
            let back = assembled.forest.find_by_id(element.id.as_str());
            prop_assert_eq!(
                back.map(|e| (&e.parent_id, &e.styles, &e.content)),
                Some((&element.parent_id, &element.styles, &element.content))
            );
        }
    }
}
