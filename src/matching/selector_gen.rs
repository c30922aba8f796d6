use crate::error::{Result, ScrapeError};
use crate::page::selector::escape_ident;
use crate::page::{class_list, ElementId, PageAdapter};

/// Tag+class descriptors matching more elements than this are too generic
const MAX_CLASS_SELECTOR_MATCHES: usize = 50;
const MAX_PATH_LEVELS: usize = 4;
const MAX_CLASSES_PER_LEVEL: usize = 2;

/// Identifier attributes checked for uniqueness, in preference order
const ID_ATTRIBUTES: [&str; 4] = ["id", "data-testid", "data-test", "data-cy"];

/// Generate a reusable descriptor for `element`.
///
/// Preference: a unique identifier attribute, then a tag+class combination
/// matching at most fifty elements, then a bounded ancestor path. Failures in
/// the first two stages degrade to the path descriptor.
pub async fn generate_selector(page: &dyn PageAdapter, element: ElementId) -> Result<String> {
    match preferred_selector(page, element).await {
        Ok(Some(selector)) => return Ok(selector),
        Ok(None) => {}
        Err(e) => {
            let err = ScrapeError::SelectorGeneration(e.to_string());
            tracing::warn!("{}; falling back to path descriptor", err);
        }
    }
    path_selector(page, element).await
}

async fn preferred_selector(page: &dyn PageAdapter, element: ElementId) -> Result<Option<String>> {
    let attributes = page.attributes(element).await?;

    for name in ID_ATTRIBUTES {
        let Some(value) = attributes.get(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let candidate = if name == "id" {
            format!("#{}", escape_ident(value))
        } else {
            format!("[{}=\"{}\"]", name, value.replace('\\', "\\\\").replace('"', "\\\""))
        };
        if page.query_selector_all(None, &candidate).await?.len() == 1 {
            return Ok(Some(candidate));
        }
    }

    let tag = page.tag_name(element).await?;
    let classes = level_classes(&class_list(&attributes));
    if !classes.is_empty() {
        let candidate = compound(&tag, &classes);
        let count = page.query_selector_all(None, &candidate).await?.len();
        if (1..=MAX_CLASS_SELECTOR_MATCHES).contains(&count) {
            return Ok(Some(candidate));
        }
        tracing::debug!("Selector '{}' matches {} elements; too generic", candidate, count);
    }

    Ok(None)
}

/// `tag.class1.class2 > ...` from the outermost of up to four levels down to the element
async fn path_selector(page: &dyn PageAdapter, element: ElementId) -> Result<String> {
    let mut levels = Vec::new();
    let mut current = Some(element);
    while let Some(id) = current {
        if levels.len() >= MAX_PATH_LEVELS {
            break;
        }
        let tag = page.tag_name(id).await?;
        if tag == "html" || tag == "body" {
            break;
        }
        let classes = level_classes(&class_list(&page.attributes(id).await?));
        levels.push(compound(&tag, &classes));
        current = page.parent(id).await?;
    }
    if levels.is_empty() {
        levels.push(page.tag_name(element).await?);
    }
    levels.reverse();
    Ok(levels.join(" > "))
}

fn level_classes(classes: &[String]) -> Vec<String> {
    classes
        .iter()
        .filter(|c| !c.is_empty())
        .take(MAX_CLASSES_PER_LEVEL)
        .map(|c| escape_ident(c))
        .collect()
}

fn compound(tag: &str, classes: &[String]) -> String {
    let mut selector = tag.to_string();
    for class in classes {
        selector.push('.');
        selector.push_str(class);
    }
    selector
}
