use crate::flash::Flash;
use crate::users::repo_types::User;

/// Escapes text for use in HTML content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> String {
    let alert = flash
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}" role="alert">{}</div>"#,
                f.kind.as_str(),
                escape(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="/add">Add User</a></nav>
<main>
{alert}
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn index(users: &[User], flash: Option<&Flash>) -> String {
    let body = if users.is_empty() {
        "<h1>Users</h1>\n<p>No users in the database yet.</p>".to_string()
    } else {
        let mut rows = String::new();
        for u in users {
            let id = u.id;
            rows.push_str(&format!(
                r#"<tr><td><img src="{image}" alt="" width="50" height="50"></td><td>{name}</td><td>{email}</td><td>{phone}</td><td><a href="/edit/{id}">Edit</a> <a href="/delete/{id}">Delete</a></td></tr>
"#,
                image = escape(&u.image),
                name = escape(&u.name),
                email = escape(&u.email),
                phone = escape(&u.phone),
            ));
        }
        format!(
            "<h1>Users</h1>\n<table>\n<thead><tr><th>Image</th><th>Name</th><th>Email</th><th>Phone</th><th>Action</th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
        )
    };
    layout("Home page", flash, &body)
}

pub fn add_user(flash: Option<&Flash>) -> String {
    let body = r#"<h1>Add User</h1>
<form action="/add" method="post" enctype="multipart/form-data">
<label>Name <input type="text" name="name" required></label>
<label>Email <input type="email" name="email" required></label>
<label>Phone <input type="tel" name="phone" required></label>
<label>Image <input type="file" name="image" accept="image/*" required></label>
<button type="submit">Add User</button>
</form>"#;
    layout("Add Users", flash, body)
}

pub fn edit_user(user: &User, flash: Option<&Flash>) -> String {
    let body = format!(
        r#"<h1>Edit User</h1>
<form action="/update/{id}" method="post" enctype="multipart/form-data">
<label>Name <input type="text" name="name" value="{name}" required></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Phone <input type="tel" name="phone" value="{phone}" required></label>
<label>Image <input type="file" name="image" accept="image/*"></label>
<img src="{image}" alt="" width="100">
<input type="hidden" name="old_image" value="{image}">
<button type="submit">Update User</button>
</form>"#,
        id = user.id,
        name = escape(&user.name),
        email = escape(&user.email),
        phone = escape(&user.phone),
        image = escape(&user.image),
    );
    layout("Edit User", flash, &body)
}
