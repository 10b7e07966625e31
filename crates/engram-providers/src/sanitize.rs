/// Best-effort repair of model output that is almost JSON: drops closing
/// brackets and braces with no matching opener, closes an unterminated
/// trailing string, and closes brackets left open at the end of input.
/// Balanced input passes through unchanged.
pub fn sanitize(text: &str) -> String {
	let mut out = String::with_capacity(text.len() + 4);
	let mut open = Vec::new();
	let mut in_string = false;
	let mut escaped = false;

	for ch in text.chars() {
		if in_string {
			out.push(ch);

			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == '"' {
				in_string = false;
			}

			continue;
		}

		match ch {
			'"' => {
				in_string = true;

				out.push(ch);
			},
			'{' => {
				open.push('}');

				out.push(ch);
			},
			'[' => {
				open.push(']');

				out.push(ch);
			},
			'}' | ']' =>
				if open.last() == Some(&ch) {
					open.pop();

					out.push(ch);
				},
			_ => out.push(ch),
		}
	}

	if in_string {
		out.push('"');
	}
	while let Some(closer) = open.pop() {
		out.push(closer);
	}

	out
}
