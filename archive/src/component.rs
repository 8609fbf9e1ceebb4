use meridian_primitives::{BlockOrEbb, Slot};

/// Projection of a stored entry, evaluated without reading more than the
/// caller asked for.
///
/// The metadata projections are answered from the secondary index alone;
/// `RawHeader` reads just the header span of the block, and only `RawBlock`
/// materialises (and checksums) the full block bytes. `Pair` sequences two
/// projections over the same entry, still with at most one epoch-file read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockComponent {
    Hash,
    Slot,
    IsEbb,
    BlockSize,
    HeaderSize,
    RawBlock,
    RawHeader,
    Pair(Box<BlockComponent>, Box<BlockComponent>),
}

impl BlockComponent {
    /// Convenience constructor for [`BlockComponent::Pair`].
    pub fn pair(first: BlockComponent, second: BlockComponent) -> BlockComponent {
        BlockComponent::Pair(Box::new(first), Box::new(second))
    }

    /// Whether evaluating this projection needs the full block bytes.
    pub(crate) fn wants_block(&self) -> bool {
        match self {
            BlockComponent::RawBlock => true,
            BlockComponent::Pair(first, second) => first.wants_block() || second.wants_block(),
            _ => false,
        }
    }

    /// Whether evaluating this projection needs the header bytes.
    pub(crate) fn wants_header(&self) -> bool {
        match self {
            BlockComponent::RawHeader => true,
            BlockComponent::Pair(first, second) => first.wants_header() || second.wants_header(),
            _ => false,
        }
    }
}

/// The value a [`BlockComponent`] projects out of an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentValue<H> {
    Hash(H),
    /// The absolute slot of the entry; for a boundary block, the first slot
    /// of its epoch.
    Slot(Slot),
    IsEbb(bool),
    BlockSize(u64),
    HeaderSize(u16),
    RawBlock(Vec<u8>),
    RawHeader(Vec<u8>),
    Pair(Box<ComponentValue<H>>, Box<ComponentValue<H>>),
}

impl<H> ComponentValue<H> {
    /// The raw block bytes, if this value holds them.
    pub fn into_raw_block(self) -> Option<Vec<u8>> {
        match self {
            ComponentValue::RawBlock(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The raw header bytes, if this value holds them.
    pub fn into_raw_header(self) -> Option<Vec<u8>> {
        match self {
            ComponentValue::RawHeader(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Everything needed to evaluate projections against one resolved entry.
pub(crate) struct ResolvedEntry<H> {
    pub hash: H,
    pub location: BlockOrEbb,
    /// Absolute slot (boundary blocks resolve to their epoch's first slot).
    pub slot: Slot,
    pub block_size: u64,
    pub header_offset: u16,
    pub header_size: u16,
}

impl<H: Clone> ResolvedEntry<H> {
    /// Evaluates the projection bottom-up. `body` must hold the full block
    /// bytes iff the projection wants them, `header` the header bytes iff
    /// only those were requested.
    pub fn project(
        &self,
        component: &BlockComponent,
        body: Option<&[u8]>,
        header: Option<&[u8]>,
    ) -> ComponentValue<H> {
        match component {
            BlockComponent::Hash => ComponentValue::Hash(self.hash.clone()),
            BlockComponent::Slot => ComponentValue::Slot(self.slot),
            BlockComponent::IsEbb => ComponentValue::IsEbb(self.location.is_ebb()),
            BlockComponent::BlockSize => ComponentValue::BlockSize(self.block_size),
            BlockComponent::HeaderSize => ComponentValue::HeaderSize(self.header_size),
            BlockComponent::RawBlock => {
                let body = body.expect("block bytes resolved for a RawBlock projection");
                ComponentValue::RawBlock(body.to_vec())
            }
            BlockComponent::RawHeader => {
                let bytes = match (header, body) {
                    (Some(header), _) => header.to_vec(),
                    (None, Some(body)) => {
                        let start = usize::from(self.header_offset);
                        let end = start + usize::from(self.header_size);
                        body[start..end].to_vec()
                    }
                    (None, None) => {
                        unreachable!("header bytes resolved for a RawHeader projection")
                    }
                };
                ComponentValue::RawHeader(bytes)
            }
            BlockComponent::Pair(first, second) => ComponentValue::Pair(
                Box::new(self.project(first, body, header)),
                Box::new(self.project(second, body, header)),
            ),
        }
    }
}
