//! Decoding sources into page sequences and assembling outputs.
//!
//! Assembly imports each referenced source's object table once, with
//! object ids offset past the destination's, then rebuilds the page tree
//! to list exactly the assembled pages in order. Objects nothing ends up
//! referencing are pruned before serialization.

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::SplitError;

/// A decoded source document: the parsed object table plus its pages in
/// document order. Populated once by the cache, then read-only.
#[derive(Debug)]
pub struct SourcePages {
    source_id: String,
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl SourcePages {
    /// Decode raw PDF bytes into an ordered page sequence.
    pub fn decode(source_id: &str, bytes: &[u8]) -> Result<Self, SplitError> {
        let doc = Document::load_mem(bytes).map_err(|e| SplitError::Decode {
            source_id: source_id.to_string(),
            message: e.to_string(),
        })?;

        let mut pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        pages.sort_by_key(|(number, _)| *number);
        let page_ids: Vec<ObjectId> = pages.into_iter().map(|(_, id)| id).collect();

        if page_ids.is_empty() {
            return Err(SplitError::Decode {
                source_id: source_id.to_string(),
                message: "document has no pages".to_string(),
            });
        }

        Ok(Self {
            source_id: source_id.to_string(),
            doc,
            page_ids,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// Resolve a 1-indexed page number to an opaque handle, or fail when
    /// the number falls outside `[1, page_count]`.
    pub fn handle(self: &Arc<Self>, page: u32) -> Result<PageHandle, SplitError> {
        let object_id = page
            .checked_sub(1)
            .and_then(|index| self.page_ids.get(index as usize))
            .copied();
        match object_id {
            Some(object_id) => Ok(PageHandle {
                source: Arc::clone(self),
                page,
                object_id,
            }),
            None => Err(SplitError::PageOutOfRange {
                source_id: self.source_id.clone(),
                page,
                page_count: self.page_count(),
            }),
        }
    }
}

/// Opaque handle to one page of a decoded source. Usable only by
/// appending it into an [`AssembledDocument`]; the page itself is never
/// copied out of its source until encode time.
#[derive(Debug, Clone)]
pub struct PageHandle {
    source: Arc<SourcePages>,
    page: u32,
    object_id: ObjectId,
}

impl PageHandle {
    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// An output document under construction: an ordered page sequence drawn
/// from one or more cached sources. Transient; encoded once, then dropped.
#[derive(Default)]
pub struct AssembledDocument {
    pages: Vec<PageHandle>,
}

impl AssembledDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: PageHandle) {
        self.pages.push(page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Encode the assembled sequence into PDF bytes.
    pub fn encode(&self) -> Result<Vec<u8>, SplitError> {
        if self.pages.is_empty() {
            return Err(SplitError::Encode("no pages to encode".to_string()));
        }

        let mut dest = Document::with_version("1.7");
        let pages_root_id = dest.new_object_id();

        // source id -> offset its imported object ids were shifted by
        let mut imported: BTreeMap<String, u32> = BTreeMap::new();
        let mut kids: Vec<ObjectId> = Vec::new();

        for handle in &self.pages {
            let offset = match imported.get(handle.source_id()) {
                Some(&offset) => offset,
                None => {
                    let offset = dest.max_id;
                    for (old_id, object) in &handle.source.doc.objects {
                        let new_id = (old_id.0 + offset, old_id.1);
                        dest.objects
                            .insert(new_id, offset_object_refs(object.clone(), offset));
                    }
                    dest.max_id += handle.source.doc.max_id;
                    imported.insert(handle.source_id().to_string(), offset);
                    offset
                }
            };

            let page_id = (handle.object_id.0 + offset, handle.object_id.1);
            // Reparent under the rebuilt page tree; the source's own tree
            // gets pruned below.
            if let Ok(Object::Dictionary(dict)) = dest.get_object_mut(page_id) {
                dict.set("Parent", Object::Reference(pages_root_id));
            }
            kids.push(page_id);
        }

        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(kids.len() as i64)),
            (
                "Kids",
                Object::Array(kids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        dest.objects.insert(pages_root_id, Object::Dictionary(pages_dict));

        let catalog_id = dest.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_root_id)),
        ]));
        dest.trailer.set("Root", Object::Reference(catalog_id));

        dest.prune_objects();
        dest.compress();

        let mut buffer = Vec::new();
        dest.save_to(&mut buffer)
            .map_err(|e| SplitError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

/// Recursively shift object references by `offset`.
fn offset_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(array) => Object::Array(
            array
                .into_iter()
                .map(|o| offset_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = offset_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = offset_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{page_texts, pdf_with_texts};
    use super::*;
    use pretty_assertions::assert_eq;

    fn decoded(source_id: &str, texts: &[&str]) -> Arc<SourcePages> {
        Arc::new(SourcePages::decode(source_id, &pdf_with_texts(texts)).unwrap())
    }

    #[test]
    fn decode_counts_pages_in_order() {
        let source = decoded("letter.pdf", &["a", "b", "c", "d"]);
        assert_eq!(source.page_count(), 4);
        assert_eq!(source.source_id(), "letter.pdf");
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = SourcePages::decode("bad.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, SplitError::Decode { source_id, .. } if source_id == "bad.pdf"));
    }

    #[test]
    fn handle_rejects_out_of_range_pages() {
        let source = decoded("letter.pdf", &["a", "b"]);
        for bad in [0, 3] {
            let err = source.handle(bad).unwrap_err();
            assert!(matches!(
                err,
                SplitError::PageOutOfRange {
                    page_count: 2,
                    page,
                    ..
                } if page == bad
            ));
        }
    }

    #[test]
    fn handles_carry_debug_context() {
        // Handles show up in test diagnostics (unwrap_err and friends), so
        // their debug output must name the source they belong to.
        let source = decoded("letter.pdf", &["a"]);
        let handle = source.handle(1).unwrap();
        assert!(format!("{:?}", handle).contains("letter.pdf"));
        assert!(format!("{:?}", source).contains("letter.pdf"));
    }

    #[test]
    fn encode_rejects_empty_document() {
        let err = AssembledDocument::new().encode().unwrap_err();
        assert!(matches!(err, SplitError::Encode(_)));
    }

    #[test]
    fn encode_preserves_order_within_one_source() {
        let source = decoded("letter.pdf", &["a", "b", "c"]);
        let mut doc = AssembledDocument::new();
        for page in [3, 1] {
            doc.push(source.handle(page).unwrap());
        }
        let bytes = doc.encode().unwrap();
        assert_eq!(page_texts(&bytes), ["c", "a"]);
    }

    #[test]
    fn encode_interleaves_pages_across_sources() {
        let letters = decoded("letter.pdf", &["a", "b"]);
        let numbers = decoded("number.pdf", &["0", "1"]);
        let mut doc = AssembledDocument::new();
        doc.push(letters.handle(1).unwrap());
        doc.push(numbers.handle(1).unwrap());
        doc.push(letters.handle(2).unwrap());
        doc.push(numbers.handle(2).unwrap());
        let bytes = doc.encode().unwrap();
        assert_eq!(page_texts(&bytes), ["a", "0", "b", "1"]);
    }

    #[test]
    fn encode_duplicates_repeated_references() {
        let source = decoded("letter.pdf", &["a", "b"]);
        let mut doc = AssembledDocument::new();
        for page in [2, 2, 1] {
            doc.push(source.handle(page).unwrap());
        }
        let bytes = doc.encode().unwrap();
        assert_eq!(page_texts(&bytes), ["b", "b", "a"]);
    }

    #[test]
    fn encoded_output_roundtrips_through_decode() {
        let source = decoded("letter.pdf", &["a", "b", "c"]);
        let mut doc = AssembledDocument::new();
        doc.push(source.handle(1).unwrap());
        doc.push(source.handle(2).unwrap());
        let bytes = doc.encode().unwrap();

        let reparsed = Arc::new(SourcePages::decode("out.pdf", &bytes).unwrap());
        assert_eq!(reparsed.page_count(), 2);
        assert_eq!(page_texts(&bytes), ["a", "b"]);
    }
}
