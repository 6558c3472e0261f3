//! Decoupoly scene property implementation.

pub use super::*;

/// Property value getters
impl DecoupolyScene {
    /// `L`
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.params.len() / LEAF_RECORD_SIZE
    }

    /// The whole parameter buffer.
    ///
    /// The shape is `[L, R * 3 + R * K + C]`.
    #[inline]
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// One leaf's parameter record.
    ///
    /// The shape is `[R * 3 + R * K + C]`.
    #[inline]
    pub fn record(
        &self,
        leaf_index: usize,
    ) -> &[f32] {
        let offset = leaf_index * LEAF_RECORD_SIZE;
        &self.params[offset..offset + LEAF_RECORD_SIZE]
    }

    /// The basis vector of the leaf's term `rank`.
    #[inline]
    pub fn basis(
        &self,
        leaf_index: usize,
        rank: usize,
    ) -> [f32; 3] {
        let record = self.record(leaf_index);
        record[rank * 3..rank * 3 + 3]
            .try_into()
            .expect("The basis block is fixed-width")
    }

    /// The polynomial coefficients of the leaf's term `rank`,
    /// in ascending degree order.
    ///
    /// The shape is `[K]`.
    #[inline]
    pub fn coefficients(
        &self,
        leaf_index: usize,
        rank: usize,
    ) -> &[f32] {
        let offset = DECOUPOLY_V_SIZE + rank * DECOUPOLY_DEGREE;
        &self.record(leaf_index)[offset..offset + DECOUPOLY_DEGREE]
    }

    /// The leaf's appearance channels.
    ///
    /// The shape is `[C]`.
    #[inline]
    pub fn appearance(
        &self,
        leaf_index: usize,
    ) -> [f32; CHANNEL_COUNT] {
        let offset = DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE;
        self.record(leaf_index)[offset..offset + CHANNEL_COUNT]
            .try_into()
            .expect("The appearance block is fixed-width")
    }

    /// The parameter buffer size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.params.len() * std::mem::size_of::<f32>()
    }
}

/// Property value setters
impl DecoupolyScene {
    pub fn set_basis(
        &mut self,
        leaf_index: usize,
        rank: usize,
        basis: [f32; 3],
    ) -> &mut Self {
        let offset = leaf_index * LEAF_RECORD_SIZE + rank * 3;
        self.params[offset..offset + 3].copy_from_slice(&basis);
        self
    }

    pub fn set_coefficients(
        &mut self,
        leaf_index: usize,
        rank: usize,
        coefficients: [f32; DECOUPOLY_DEGREE],
    ) -> &mut Self {
        let offset = leaf_index * LEAF_RECORD_SIZE
            + DECOUPOLY_V_SIZE
            + rank * DECOUPOLY_DEGREE;
        self.params[offset..offset + DECOUPOLY_DEGREE]
            .copy_from_slice(&coefficients);
        self
    }

    pub fn set_appearance(
        &mut self,
        leaf_index: usize,
        appearance: [f32; CHANNEL_COUNT],
    ) -> &mut Self {
        let offset =
            leaf_index * LEAF_RECORD_SIZE + DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE;
        self.params[offset..offset + CHANNEL_COUNT]
            .copy_from_slice(&appearance);
        self
    }

    /// Replaces the whole parameter buffer.
    ///
    /// # Errors
    ///
    /// The length should be a multiple of the leaf record size.
    pub fn set_params(
        &mut self,
        params: Vec<f32>,
    ) -> Result<&mut Self, Error> {
        if params.len() % LEAF_RECORD_SIZE != 0 {
            return Err(Error::Validation(
                format!("params.len() {}", params.len()),
                format!("a multiple of the record size {LEAF_RECORD_SIZE}"),
            ));
        }
        self.params = params;
        Ok(self)
    }
}
