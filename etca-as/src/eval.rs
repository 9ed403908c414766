//! Bottom-up semantic evaluation of one parse tree.
//!
//! Children are evaluated left to right before their parent's action runs,
//! mirroring the dispatch the composed grammar encodes: element nodes run
//! their syntax element's action, `_raw` nodes yield the covered source
//! slice, synthetic nodes splice or drop their children.

use crate::assembler::Assembler;
use crate::error::ActionError;
use crate::grammar::{Grammar, NodeAction, Tree};
use crate::value::Value;

/// Evaluate a parse tree to the value of its root node.
pub fn evaluate(
    asm: &mut Assembler,
    grammar: &Grammar,
    tree: &Tree,
    line: &str,
) -> Result<Value, ActionError> {
    match tree {
        Tree::Token { start, end, .. } => Ok(Value::Str(line[*start..*end].to_string())),
        Tree::Node {
            prod,
            start,
            end,
            children,
        } => match grammar.productions[*prod].node {
            NodeAction::Element(element) => {
                let mut values = Vec::new();
                collect_children(asm, grammar, children, line, &mut values)?;
                (element.action)(asm, &values)
            }
            // Raw nodes forward the source slice; their children are not
            // evaluated, the re-parse at the use site does that.
            NodeAction::Raw => Ok(Value::Str(line[*start..*end].to_string())),
            NodeAction::NonePlaceholder => Ok(Value::None),
            NodeAction::Inline | NodeAction::Discard => {
                unreachable!("synthetic node evaluated outside collect_children")
            }
        },
    }
}

fn collect_children(
    asm: &mut Assembler,
    grammar: &Grammar,
    children: &[Tree],
    line: &str,
    values: &mut Vec<Value>,
) -> Result<(), ActionError> {
    for child in children {
        match child {
            Tree::Token { term, start, end } => {
                if grammar.terminals[*term].keep {
                    values.push(Value::Str(line[*start..*end].to_string()));
                }
            }
            Tree::Node {
                prod,
                children: grandchildren,
                ..
            } => match grammar.productions[*prod].node {
                NodeAction::Discard => {}
                NodeAction::Inline => {
                    collect_children(asm, grammar, grandchildren, line, values)?;
                }
                NodeAction::NonePlaceholder => values.push(Value::None),
                NodeAction::Element(_) | NodeAction::Raw => {
                    values.push(evaluate(asm, grammar, child, line)?);
                }
            },
        }
    }
    Ok(())
}
