pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

/// Splits rendered SQL into individual non-empty statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_properties.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_properties.sql")),
				"tables/002_property_amenities.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_property_amenities.sql")),
				"tables/003_units.sql" => out.push_str(include_str!("../../../sql/tables/003_units.sql")),
				"tables/004_unit_amenities.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_unit_amenities.sql")),
				"tables/005_listings.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_listings.sql")),
				"tables/006_listing_units.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_listing_units.sql")),
				"tables/007_listing_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_listing_tags.sql")),
				"tables/008_entity_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_entity_cache.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
