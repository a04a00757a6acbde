use crate::{StyleTable, Worksheet, WorksheetId};

/// A workbook containing worksheets and shared style resources.
#[derive(Clone, Debug)]
pub struct Workbook {
    /// Worksheets in tab order.
    pub sheets: Vec<Worksheet>,

    /// Workbook style table (deduplicated).
    pub styles: StyleTable,

    /// Sheet shown when the file is opened (`bookViews/workbookView/@activeTab`).
    pub active_sheet: Option<WorksheetId>,

    next_sheet_id: WorksheetId,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            styles: StyleTable::new(),
            active_sheet: None,
            next_sheet_id: 1,
        }
    }

    /// Append a worksheet, returning its id.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> WorksheetId {
        let index = self.sheets.len();
        self.insert_sheet(index, name)
    }

    /// Insert a worksheet at tab position `index` (clamped), returning its id.
    pub fn insert_sheet(&mut self, index: usize, name: impl Into<String>) -> WorksheetId {
        let id = self.next_sheet_id;
        self.next_sheet_id = self.next_sheet_id.wrapping_add(1);
        let index = index.min(self.sheets.len());
        self.sheets.insert(index, Worksheet::new(id, name));
        id
    }

    /// Insert a worksheet at tab position `index` (clamped) and return it split-borrowed
    /// with the style table, ready to be filled in.
    pub fn insert_sheet_with_styles(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> (&mut Worksheet, &mut StyleTable) {
        let index = index.min(self.sheets.len());
        self.insert_sheet(index, name);
        (&mut self.sheets[index], &mut self.styles)
    }

    pub fn sheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn sheet_mut(&mut self, id: WorksheetId) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.id == id)
    }

    /// Find a sheet by name (case-insensitive, like Excel).
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| sheet_name_eq(&s.name, name))
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| sheet_name_eq(&s.name, name))
    }

    /// Tab position of the named sheet.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| sheet_name_eq(&s.name, name))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Remove the named sheet, returning it. The active sheet falls back to the
    /// first remaining tab when the removed sheet was active.
    pub fn remove_sheet_by_name(&mut self, name: &str) -> Option<Worksheet> {
        let index = self.sheet_index(name)?;
        let removed = self.sheets.remove(index);
        if self.active_sheet == Some(removed.id) {
            self.active_sheet = self.sheets.first().map(|s| s.id);
        }
        Some(removed)
    }

    /// Make `id` the active sheet and the only selected tab.
    pub fn activate(&mut self, id: WorksheetId) -> bool {
        if self.sheet(id).is_none() {
            return false;
        }
        for sheet in &mut self.sheets {
            sheet.tab_selected = sheet.id == id;
        }
        self.active_sheet = Some(id);
        true
    }

    /// Tab index of the active sheet (0 when unset).
    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
            .and_then(|id| self.sheets.iter().position(|s| s.id == id))
            .unwrap_or(0)
    }

    /// Split borrow of one sheet and the style table, for styling cells in place.
    pub fn sheet_with_styles_mut(
        &mut self,
        id: WorksheetId,
    ) -> Option<(&mut Worksheet, &mut StyleTable)> {
        let sheet = self.sheets.iter_mut().find(|s| s.id == id)?;
        Some((sheet, &mut self.styles))
    }
}

fn sheet_name_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
