//! Case-list XML reader.
//!
//! Expected shape:
//!
//! ```xml
//! <TestCaseList PackageName="dEQP-GLES2">
//!   <TestCase Name="info" CaseType="TestGroup">
//!     <TestCase Name="vendor" CaseType="SelfValidate"/>
//!   </TestCase>
//! </TestCaseList>
//! ```
//!
//! Only `TestCase` elements contribute nodes. Any other element is skipped
//! together with everything nested inside it.

use super::{TestNode, TestTree};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::PathBuf;
use thiserror::Error;

const TEST_CASE_TAG: &[u8] = b"TestCase";
const PACKAGE_ATTR: &[u8] = b"PackageName";
const NAME_ATTR: &[u8] = b"Name";
const CASE_TYPE_ATTR: &[u8] = b"CaseType";

/// The description could not be turned into a tree. No partial tree is
/// ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to read case list '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed case list near byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("case list has no root element")]
    MissingRoot,

    #[error("case list ends inside an unclosed element")]
    Truncated,

    #[error("TestCase near byte {position} has no Name attribute")]
    MissingName { position: u64 },
}

fn attribute(
    element: &BytesStart<'_>,
    key: &[u8],
    position: u64,
) -> Result<Option<String>, TreeError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| TreeError::Xml {
            position,
            source: e.into(),
        })?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|source| TreeError::Xml { position, source })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn test_node(element: &BytesStart<'_>, position: u64) -> Result<TestNode, TreeError> {
    let name = attribute(element, NAME_ATTR, position)?
        .ok_or(TreeError::MissingName { position })?;
    let case_type = attribute(element, CASE_TYPE_ATTR, position)?.unwrap_or_default();
    Ok(TestNode::new(name, case_type))
}

fn attach(stack: &mut [TestNode], roots: &mut Vec<TestNode>, node: TestNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Parse a case list held in memory.
pub fn parse_case_list(text: &str) -> Result<TestTree, TreeError> {
    let mut reader = Reader::from_str(text);

    let mut package: Option<String> = None;
    let mut root_closed = false;
    let mut stack: Vec<TestNode> = Vec::new();
    let mut roots: Vec<TestNode> = Vec::new();
    // Depth inside an ignored element; 0 when not skipping.
    let mut skip_depth = 0usize;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|source| TreeError::Xml { position, source })?;

        match event {
            Event::Start(element) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if package.is_none() {
                    package = Some(attribute(&element, PACKAGE_ATTR, position)?.unwrap_or_default());
                } else if root_closed || element.name().as_ref() != TEST_CASE_TAG {
                    skip_depth = 1;
                } else {
                    stack.push(test_node(&element, position)?);
                }
            }
            Event::Empty(element) => {
                if skip_depth > 0 || root_closed {
                    continue;
                }
                if package.is_none() {
                    package = Some(attribute(&element, PACKAGE_ATTR, position)?.unwrap_or_default());
                    root_closed = true;
                } else if element.name().as_ref() == TEST_CASE_TAG {
                    let node = test_node(&element, position)?;
                    attach(&mut stack, &mut roots, node);
                }
            }
            Event::End(_) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut roots, node);
                } else {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let package = package.ok_or(TreeError::MissingRoot)?;
    if !root_closed || !stack.is_empty() {
        return Err(TreeError::Truncated);
    }
    Ok(TestTree::new(package, roots))
}
