//! Landing page served at `/`.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Device setup</title>
<style>
body { font-family: sans-serif; max-width: 28em; margin: 1em auto; padding: 0 1em; }
input { width: 100%; margin-bottom: .5em; }
pre { background: #eee; padding: .5em; overflow-x: auto; }
</style>
</head>
<body>
<h3>Wi-Fi</h3>
<form id="wifi">
SSID<br><input name="ssid" maxlength="32"><br>
Password<br><input name="pass" maxlength="64" type="password"><br>
<button type="submit">Save</button>
</form>
<p id="msg"></p>
<h3>Status</h3>
<pre id="status"></pre>
<h3>Modules</h3>
<pre id="modules"></pre>
<button id="apply">Apply configuration</button>
<button id="reset">Factory reset</button>
<script>
const msg = (t) => document.getElementById('msg').textContent = t;
const show = (id, url) => fetch(url).then(r => r.json())
  .then(j => document.getElementById(id).textContent = JSON.stringify(j, null, 2));
document.getElementById('wifi').onsubmit = async (e) => {
  e.preventDefault();
  const cfg = await (await fetch('/api/config')).json();
  cfg.net = cfg.net || {};
  cfg.net.sta = { ssid: e.target.ssid.value, pass: e.target.pass.value };
  const r = await fetch('/api/config', { method: 'POST', body: JSON.stringify(cfg) });
  const j = await r.json();
  msg(j.ok ? 'Saved. Restart the device to join the network.' : 'Error: ' + j.error);
};
document.getElementById('apply').onclick = async () => {
  const j = await (await fetch('/api/apply', { method: 'POST' })).json();
  msg(j.ok ? 'Applied.' : 'Error: ' + j.error);
  show('modules', '/api/modules');
};
document.getElementById('reset').onclick = async () => {
  if (!confirm('Erase all settings and restart?')) return;
  await fetch('/api/factory_reset', { method: 'POST' });
  msg('Restarting...');
};
show('status', '/api/status');
show('modules', '/api/modules');
</script>
</body>
</html>
"#;
