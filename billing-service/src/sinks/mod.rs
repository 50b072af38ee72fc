pub mod consumption_csv;
pub mod invoice;

pub use consumption_csv::ConsumptionCsvSink;
pub use invoice::InvoiceSink;
