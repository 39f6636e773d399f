//! Table discovery: depth-first search for the first table in a container.

use crate::error::{IterError, IterResult};
use crate::source::{Container, Entry, Opener, Table};

use super::observability::{Diagnostics, IterationEvent};

/// Find the first table in `container`, searching nested containers depth-first in the order
/// the container reports its entries.
///
/// Returns the table's `/`-separated path (entry names decoded, cycle suffixes stripped) and a
/// handle to it. Fails with [`IterError::NoTableFound`] if the hierarchy holds no table.
pub fn locate_table(
    container: &dyn Container,
    diagnostics: &Diagnostics,
) -> IterResult<(String, Box<dyn Table>)> {
    match find_first(container, "")? {
        Some((path, table)) => {
            diagnostics.emit(IterationEvent::TableLocated {
                container: container.identity(),
                path: path.clone(),
            });
            Ok((path, table))
        }
        None => Err(IterError::NoTableFound {
            container: container.identity(),
        }),
    }
}

/// Open `path` with `opener` and locate its first table.
pub fn locate_table_at(
    path: &str,
    opener: &dyn Opener,
    diagnostics: &Diagnostics,
) -> IterResult<(String, Box<dyn Table>)> {
    let container = opener.open(path)?;
    locate_table(container.as_ref(), diagnostics)
}

fn find_first(
    container: &dyn Container,
    prefix: &str,
) -> IterResult<Option<(String, Box<dyn Table>)>> {
    for (key, entry) in container.entries()? {
        let name = format!("{prefix}{}", key.entry_name());
        match entry {
            Entry::Table(table) => return Ok(Some((name, table))),
            Entry::Directory(dir) => {
                if let Some(found) = find_first(dir.as_ref(), &format!("{name}/"))? {
                    return Ok(Some(found));
                }
            }
            Entry::Other => {}
        }
    }
    Ok(None)
}
