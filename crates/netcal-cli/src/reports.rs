use comfy_table::{presets::UTF8_FULL, Cell, Table};
use netcal_core::evallog::EvaluationRow;

pub fn best_table(names: &[String], rows: &[EvaluationRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec![
        Cell::new("Rank"),
        Cell::new("Value"),
        Cell::new("Generation"),
        Cell::new("Client"),
    ];
    header.extend(names.iter().map(Cell::new));
    table.set_header(header);

    for (rank, row) in rows.iter().enumerate() {
        let mut cells = vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.4}", row.value)),
            Cell::new(row.generation),
            Cell::new(&row.client),
        ];
        cells.extend(row.values.iter().map(|v| Cell::new(format!("{:.4}", v))));
        table.add_row(cells);
    }
    table
}
