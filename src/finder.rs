use crate::r#box::{BoxNode, FourCC};

/// First box of the given type in depth-first pre-order, the subtree root
/// included, or None.
pub fn find_one<'t, 'a>(root: &'t BoxNode<'a>, kind: FourCC) -> Option<&'t BoxNode<'a>> {
    find_all(root, kind).next()
}

/// All boxes of the given type, lazily, in depth-first pre-order: parents
/// before children, siblings in document order.
pub fn find_all<'t, 'a>(root: &'t BoxNode<'a>, kind: FourCC) -> FindAll<'t, 'a> {
    FindAll {
        kind,
        stack: vec![root],
    }
}

pub struct FindAll<'t, 'a> {
    kind: FourCC,
    stack: Vec<&'t BoxNode<'a>>,
}

impl<'t, 'a> Iterator for FindAll<'t, 'a> {
    type Item = &'t BoxNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            if node.kind == self.kind {
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r#box::parse;

    fn container(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut bytes = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(kind);
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn finds_in_document_order() {
        // moov > (trak > mdia, trak)
        let first = container(b"trak", &container(b"mdia", &[]));
        let second = container(b"trak", &[]);
        let moov = container(b"moov", &[first.clone(), second.clone()].concat());

        let tree = parse(&moov).unwrap();
        let tracks: Vec<_> = find_all(&tree, FourCC::new(*b"trak")).collect();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].data, &moov[8..8 + first.len()]);
        assert_eq!(tracks[1].data, &moov[8 + first.len()..]);

        let one = find_one(&tree, FourCC::new(*b"trak")).unwrap();
        assert!(std::ptr::eq(one, tracks[0]));
    }

    #[test]
    fn search_stays_inside_the_subtree() {
        let inner = container(b"mdia", &[]);
        let trak = container(b"trak", &inner);
        let moov = container(b"moov", &trak);

        let tree = parse(&moov).unwrap();
        let trak_node = find_one(&tree, FourCC::new(*b"trak")).unwrap();
        // the subtree root itself is part of the search
        assert!(std::ptr::eq(
            find_one(trak_node, FourCC::new(*b"trak")).unwrap(),
            trak_node
        ));
        assert!(find_one(trak_node, FourCC::new(*b"mdia")).is_some());
        // ancestors are not
        assert!(find_one(trak_node, FourCC::new(*b"moov")).is_none());
    }

    #[test]
    fn missing_type_yields_none() {
        let moov = container(b"moov", &[]);
        let tree = parse(&moov).unwrap();
        assert!(find_one(&tree, FourCC::new(*b"mdat")).is_none());
        assert_eq!(find_all(&tree, FourCC::new(*b"mdat")).count(), 0);
    }
}
